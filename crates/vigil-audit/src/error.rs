// error.rs — Error types for the audit ledger.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Each variant maps to a specific failure mode in the ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the ledger file.
    #[error("failed to open audit ledger at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an entry to the ledger.
    #[error("failed to append entry: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize an entry (malformed JSON).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The ledger has been tampered with — the hash chain is broken.
    /// Reported to the forensics caller, never auto-corrected.
    #[error("chain verification failed at seq {seq}: {detail}")]
    ChainVerificationFailure { seq: u64, detail: String },

    /// Sequence numbers are not contiguous — an entry was removed or inserted.
    #[error("sequence gap: expected seq {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    /// A requested range does not exist in the ledger.
    #[error("seq range {from}..={to} out of bounds (ledger has {len} entries)")]
    RangeOutOfBounds { from: u64, to: u64, len: u64 },
}
