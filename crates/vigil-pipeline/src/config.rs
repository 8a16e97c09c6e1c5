// config.rs — Pipeline configuration.
//
// Two layers: `PipelineConfig` decides WHERE state lives (the `.vigil/`
// layout, shared by every store the pipeline opens), and `GuardConfig`
// decides HOW strictly the stages judge (thresholds, budgets, windows).
// Both are read once at pipeline construction; a running pipeline never
// consults mutable global config mid-decision.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vigil_guard::{AnomalyConfig, OverflowPolicy};

use crate::error::PipelineError;

/// Where the pipeline stores its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory of the project being guarded.
    pub project_root: PathBuf,

    /// Directory for identity records (one JSON file per identity).
    pub identities_dir: PathBuf,

    /// Directory for tool registrations (one JSON file per tool).
    pub tools_dir: PathBuf,

    /// Directory for approval tickets (one JSON file per ticket).
    pub tickets_dir: PathBuf,

    /// Path to the append-only audit ledger.
    pub audit_log: PathBuf,
}

impl PipelineConfig {
    /// Create a config with the standard `.vigil/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let vigil_dir = root.join(".vigil");
        Self {
            project_root: root,
            identities_dir: vigil_dir.join("identities"),
            tools_dir: vigil_dir.join("tools"),
            tickets_dir: vigil_dir.join("tickets"),
            audit_log: vigil_dir.join("audit.jsonl"),
        }
    }
}

/// Intent-drift thresholds. Scores are in `[0, 1]`; lower means the
/// action looks less like the declared intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntentThresholds {
    /// Below this the action is flagged MEDIUM.
    pub medium_threshold: f64,
    /// Below this the action is flagged HIGH.
    pub high_threshold: f64,
}

impl Default for IntentThresholds {
    fn default() -> Self {
        Self {
            medium_threshold: 0.2,
            high_threshold: 0.05,
        }
    }
}

/// Context-window budget and what to do on overflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextBudget {
    pub max_tokens: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: 8_000,
            overflow_policy: OverflowPolicy::Truncate,
        }
    }
}

/// How long a suspended action waits for a decision before expiring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApprovalWindow {
    pub max_wait_seconds: u64,
}

impl Default for ApprovalWindow {
    fn default() -> Self {
        Self {
            max_wait_seconds: 300,
        }
    }
}

/// Tunable behavior of the check stages and the breaker.
///
/// Loadable from a `vigil.toml`:
///
/// ```toml
/// scope_categories = ["execute", "api", "retrieve", "message", "admin"]
///
/// [intent]
/// medium_threshold = 0.2
/// high_threshold = 0.05
///
/// [context]
/// max_tokens = 8000
/// overflow_policy = "truncate"
///
/// [anomaly]
/// window_seconds = 60
/// max_actions = 20
/// max_failure_ratio = 0.5
/// min_samples = 5
///
/// [approval]
/// max_wait_seconds = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GuardConfig {
    pub intent: IntentThresholds,
    pub context: ContextBudget,
    pub anomaly: AnomalyConfig,
    pub approval: ApprovalWindow,
    /// Scope categories the identity registry accepts. Empty means the
    /// built-in vocabulary.
    pub scope_categories: Vec<String>,
}

impl GuardConfig {
    /// Load from a TOML file. Unspecified fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
