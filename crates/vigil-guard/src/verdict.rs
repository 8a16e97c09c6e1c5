// verdict.rs — Risk levels, stage verdicts, and the CheckStage trait.
//
// Every check stage consumes an action plus its identity/tool context and
// produces a Verdict. Stages are pure with respect to pipeline state:
// they never mutate identity, tool, or ticket records (audit writes are
// the orchestrator's job, per stage, from the returned verdict).

use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_identity::AgentIdentity;
use vigil_tools::ToolRegistration;

use crate::action::ActionRecord;
use crate::error::GuardError;

/// How risky a flagged action is.
///
/// Derives `Ord` so the orchestrator can aggregate stage verdicts with
/// "highest risk observed wins".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// A check stage's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The stage found nothing objectionable.
    Allow,
    /// The stage flagged the action with a risk level and reason.
    Flag { risk: RiskLevel, reason: String },
}

impl Verdict {
    /// Convenience constructor for a flag.
    pub fn flag(risk: RiskLevel, reason: impl Into<String>) -> Self {
        Verdict::Flag {
            risk,
            reason: reason.into(),
        }
    }

    /// The risk carried by this verdict, if flagged.
    pub fn risk(&self) -> Option<RiskLevel> {
        match self {
            Verdict::Allow => None,
            Verdict::Flag { risk, .. } => Some(*risk),
        }
    }

    /// Short label for audit entries (e.g., "allow", "flag:high").
    pub fn label(&self) -> String {
        match self {
            Verdict::Allow => "allow".to_string(),
            Verdict::Flag { risk, .. } => format!("flag:{}", risk),
        }
    }

    /// The reason attached to this verdict, if any.
    pub fn reason(&self) -> &str {
        match self {
            Verdict::Allow => "",
            Verdict::Flag { reason, .. } => reason,
        }
    }
}

/// The common capability all check stages expose.
///
/// Implementations must be `Send + Sync`: the pipeline is shared across
/// worker threads behind an `Arc` and evaluates stages with `&self`.
pub trait CheckStage: Send + Sync {
    /// Stable stage name, used in audit entries.
    fn name(&self) -> &'static str;

    /// Evaluate one action. Errors are treated as evaluation failures and
    /// fail the whole request closed.
    fn evaluate(
        &self,
        action: &ActionRecord,
        identity: &AgentIdentity,
        tool: &ToolRegistration,
    ) -> Result<Verdict, GuardError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_order_by_severity() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(
            [RiskLevel::Medium, RiskLevel::High, RiskLevel::Low]
                .into_iter()
                .max(),
            Some(RiskLevel::High)
        );
    }

    #[test]
    fn verdict_labels_for_audit() {
        assert_eq!(Verdict::Allow.label(), "allow");
        assert_eq!(
            Verdict::flag(RiskLevel::High, "drift").label(),
            "flag:high"
        );
    }

    #[test]
    fn verdict_serializes_as_snake_case() {
        let json = serde_json::to_string(&Verdict::flag(RiskLevel::Medium, "x")).unwrap();
        assert!(json.contains("\"flag\""));
        assert!(json.contains("\"medium\""));
    }
}
