// context.rs — Context Governor: token budget enforcement.
//
// The accumulated context passed to the agent is bounded. When the budget
// would be exceeded, the governor either rejects the action or truncates
// the context, per configured policy — but pinned segments (critical
// constraints) are always preserved verbatim, never silently dropped.
//
// Token counts are an estimate (whitespace-separated words). The budget
// is a guard rail, not a billing meter; the estimate only has to be
// monotone in text length.

use serde::{Deserialize, Serialize};
use vigil_identity::AgentIdentity;
use vigil_tools::ToolRegistration;

use crate::action::{ActionRecord, ContextSegment};
use crate::error::GuardError;
use crate::verdict::{CheckStage, RiskLevel, Verdict};

/// What to do when the context exceeds the budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop unpinned segments (oldest first) until the context fits.
    #[default]
    Truncate,
    /// Refuse the action outright.
    Reject,
}

/// The result of assembling a budget-conforming context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedContext {
    /// Surviving segments, pinned ones always intact and verbatim.
    pub segments: Vec<ContextSegment>,
    /// Estimated token count of the surviving segments.
    pub tokens_used: usize,
    /// Whether any unpinned segment was dropped.
    pub truncated: bool,
}

/// Estimate tokens in a text as whitespace-separated words.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The context-governing stage.
#[derive(Debug, Clone)]
pub struct ContextGovernor {
    max_tokens: usize,
    policy: OverflowPolicy,
}

impl ContextGovernor {
    pub fn new(max_tokens: usize, policy: OverflowPolicy) -> Self {
        Self { max_tokens, policy }
    }

    /// Assemble a context that fits the budget.
    ///
    /// Pinned segments are kept verbatim unconditionally; unpinned
    /// segments are kept newest-last and dropped oldest-first when over
    /// budget. Fails if the pinned segments alone do not fit — the budget
    /// cannot be honored without dropping a constraint, which is never
    /// allowed.
    pub fn prepare(&self, segments: &[ContextSegment]) -> Result<PreparedContext, GuardError> {
        let pinned_tokens: usize = segments
            .iter()
            .filter(|s| s.pinned)
            .map(|s| estimate_tokens(&s.text))
            .sum();
        if pinned_tokens > self.max_tokens {
            return Err(GuardError::PinnedBudgetExceeded {
                needed: pinned_tokens,
                budget: self.max_tokens,
            });
        }

        // Walk unpinned segments newest-first, keeping as many as fit.
        let mut unpinned_budget = self.max_tokens - pinned_tokens;
        let mut keep = vec![false; segments.len()];
        for (i, segment) in segments.iter().enumerate().rev() {
            if segment.pinned {
                keep[i] = true;
                continue;
            }
            let tokens = estimate_tokens(&segment.text);
            if tokens <= unpinned_budget {
                unpinned_budget -= tokens;
                keep[i] = true;
            }
        }

        let truncated = keep.iter().any(|k| !k);
        let kept: Vec<ContextSegment> = segments
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(s, _)| s.clone())
            .collect();
        let tokens_used = kept.iter().map(|s| estimate_tokens(&s.text)).sum();

        if truncated {
            tracing::debug!(tokens_used, budget = self.max_tokens, "context truncated");
        }

        Ok(PreparedContext {
            segments: kept,
            tokens_used,
            truncated,
        })
    }

    /// Total estimated tokens across segments.
    fn total_tokens(segments: &[ContextSegment]) -> usize {
        segments.iter().map(|s| estimate_tokens(&s.text)).sum()
    }
}

impl CheckStage for ContextGovernor {
    fn name(&self) -> &'static str {
        "context_governor"
    }

    fn evaluate(
        &self,
        action: &ActionRecord,
        _identity: &AgentIdentity,
        _tool: &ToolRegistration,
    ) -> Result<Verdict, GuardError> {
        let total = Self::total_tokens(&action.context);
        if total <= self.max_tokens {
            return Ok(Verdict::Allow);
        }

        // Over budget. If even the pinned constraints do not fit, no
        // policy can save this action.
        let pinned: usize = action
            .context
            .iter()
            .filter(|s| s.pinned)
            .map(|s| estimate_tokens(&s.text))
            .sum();
        if pinned > self.max_tokens {
            return Ok(Verdict::flag(
                RiskLevel::High,
                format!(
                    "pinned constraints need {} tokens, budget is {}",
                    pinned, self.max_tokens
                ),
            ));
        }

        match self.policy {
            OverflowPolicy::Reject => Ok(Verdict::flag(
                RiskLevel::Medium,
                format!(
                    "context uses {} tokens, budget is {} (policy: reject)",
                    total, self.max_tokens
                ),
            )),
            OverflowPolicy::Truncate => Ok(Verdict::flag(
                RiskLevel::Low,
                format!(
                    "context uses {} tokens, budget is {} (will truncate)",
                    total, self.max_tokens
                ),
            )),
        }
    }
}
