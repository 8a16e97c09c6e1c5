// intent.rs — Intent Validator: catches semantic drift.
//
// Compares what the agent is about to do (tool, target, arguments) against
// the intent it declared for the task. A hijacked agent that was told to
// "read the configuration file" but proposes `drop_table production_users`
// shares no vocabulary with its intent and gets flagged HIGH, whatever
// risk level the agent itself claimed.
//
// How similarity is computed is pluggable via the IntentScorer trait; the
// default is a rule-based token-overlap scorer. An embedding-backed scorer
// can be swapped in without touching the stage.

use vigil_identity::AgentIdentity;
use vigil_tools::ToolRegistration;

use crate::action::ActionRecord;
use crate::error::GuardError;
use crate::verdict::{CheckStage, RiskLevel, Verdict};

/// Scores how well an action matches its declared intent.
///
/// Returns a value in `[0.0, 1.0]`; higher means better aligned.
pub trait IntentScorer: Send + Sync {
    fn score(&self, intent: &str, action: &ActionRecord) -> f64;
}

/// Default rule-based scorer: Jaccard overlap between the intent's tokens
/// and the tokens of the action's tool name, target, and arguments.
#[derive(Debug, Default)]
pub struct TokenOverlapScorer;

impl IntentScorer for TokenOverlapScorer {
    fn score(&self, intent: &str, action: &ActionRecord) -> f64 {
        let intent_tokens = tokenize(intent);
        let mut action_text = format!("{} {}", action.tool_name, action.target);
        collect_json_text(&action.args, &mut action_text);
        let action_tokens = tokenize(&action_text);

        if intent_tokens.is_empty() || action_tokens.is_empty() {
            // Nothing to compare — maximally drifted, not maximally aligned.
            return 0.0;
        }

        let intersection = intent_tokens
            .iter()
            .filter(|t| action_tokens.contains(*t))
            .count();
        let union = intent_tokens.union(&action_tokens).count();
        intersection as f64 / union as f64
    }
}

/// Lowercased alphanumeric tokens; separators (including `_`, `.`, `/`)
/// split so "read_file" and "report.pdf" share tokens with prose intents.
fn tokenize(text: &str) -> std::collections::BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn collect_json_text(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::String(s) => {
            out.push(' ');
            out.push_str(s);
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json_text(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                out.push(' ');
                out.push_str(key);
                collect_json_text(item, out);
            }
        }
        _ => {}
    }
}

/// The intent-validation stage.
pub struct IntentValidator {
    scorer: Box<dyn IntentScorer>,
    /// Scores below this are drifted enough to flag MEDIUM.
    medium_threshold: f64,
    /// Scores below this are drifted enough to flag HIGH.
    high_threshold: f64,
}

impl IntentValidator {
    pub fn new(medium_threshold: f64, high_threshold: f64) -> Self {
        Self {
            scorer: Box::new(TokenOverlapScorer),
            medium_threshold,
            high_threshold,
        }
    }

    /// Swap in a different similarity function (e.g., embedding-backed).
    pub fn with_scorer(mut self, scorer: Box<dyn IntentScorer>) -> Self {
        self.scorer = scorer;
        self
    }
}

impl Default for IntentValidator {
    fn default() -> Self {
        Self::new(0.2, 0.05)
    }
}

impl CheckStage for IntentValidator {
    fn name(&self) -> &'static str {
        "intent_validator"
    }

    fn evaluate(
        &self,
        action: &ActionRecord,
        _identity: &AgentIdentity,
        _tool: &ToolRegistration,
    ) -> Result<Verdict, GuardError> {
        let score = self.scorer.score(&action.intent, action);
        tracing::debug!(
            action_id = %action.action_id,
            score,
            "intent similarity scored"
        );

        if score < self.high_threshold {
            Ok(Verdict::flag(
                RiskLevel::High,
                format!(
                    "action diverges from declared intent (similarity {:.2})",
                    score
                ),
            ))
        } else if score < self.medium_threshold {
            Ok(Verdict::flag(
                RiskLevel::Medium,
                format!(
                    "action weakly matches declared intent (similarity {:.2})",
                    score
                ),
            ))
        } else {
            Ok(Verdict::Allow)
        }
    }
}
