// error.rs — Error types for the guard stages.
//
// Stage errors are deliberately coarse: the orchestrator folds any stage
// failure into a DENY disposition (fail closed), so the variants exist
// for audit reasons, not for caller branching.

use thiserror::Error;

/// Errors that can occur inside a check stage.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A configured scan pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The pinned context segments alone exceed the token budget — the
    /// budget cannot be honored without dropping a pinned constraint.
    #[error("pinned context segments need {needed} tokens, budget is {budget}")]
    PinnedBudgetExceeded { needed: usize, budget: usize },
}
