//! # vigil-guard
//!
//! The check stages of the Vigil pipeline. Every action an agent attempts
//! passes through a fixed sequence of stages, each of which examines the
//! action against the identity performing it and the tool it invokes, and
//! returns a verdict: allow, or flag at a risk level.
//!
//! The stages, in pipeline order:
//!
//! 1. [`IntentValidator`] — does the action plausibly serve the agent's
//!    declared intent?
//! 2. [`ProvenanceFirewall`] — for retrievals, is the agent cleared for
//!    the document, and does the content carry embedded instructions?
//! 3. [`ContextGovernor`] — does the accumulated context fit the token
//!    budget without dropping pinned constraints?
//! 4. [`AnomalyDetector`] — is this identity behaving like a runaway or
//!    compromised process?
//!
//! Stages share the [`CheckStage`] trait so the orchestrator can run them
//! uniformly and audit each verdict. Stages never block or deny on their
//! own; escalation is the orchestrator's job.
//!
//! ## Quick Example
//!
//! ```no_run
//! use vigil_guard::{ActionRecord, CheckStage, IntentValidator};
//! use vigil_identity::AgentIdentity;
//!
//! # fn demo(identity: &AgentIdentity, tool: &vigil_tools::ToolRegistration) {
//! let action = ActionRecord::new(
//!     identity.agent_id,
//!     "summarize the quarterly report",
//!     "read_file",
//!     "reports/q3.pdf",
//! );
//! let validator = IntentValidator::default();
//! let verdict = validator.evaluate(&action, identity, tool).unwrap();
//! println!("{}", verdict.label());
//! # }
//! ```

pub mod action;
pub mod anomaly;
pub mod context;
pub mod error;
pub mod intent;
pub mod provenance;
pub mod verdict;

pub use action::{ActionKind, ActionRecord, ContextSegment};
pub use anomaly::{AnomalyConfig, AnomalyDetector};
pub use context::{ContextGovernor, OverflowPolicy, PreparedContext};
pub use error::GuardError;
pub use intent::{IntentScorer, IntentValidator, TokenOverlapScorer};
pub use provenance::{scope_covers, ProvenanceFirewall};
pub use verdict::{CheckStage, RiskLevel, Verdict};
