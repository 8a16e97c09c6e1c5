//! # vigil-pipeline
//!
//! The orchestrator that ties Vigil together. Agent frameworks hand every
//! tool call, retrieval, and message to [`GuardPipeline::handle`] as an
//! [`ActionRecord`](vigil_guard::ActionRecord) and act on the returned
//! [`Disposition`]: execute on ALLOW, refuse on DENY, or poll the breaker
//! on PENDING_APPROVAL.
//!
//! The pipeline owns the identity registry, the tool registry, the audit
//! ledger, the check stages, and the circuit breaker, all rooted in a
//! `.vigil/` directory so decisions and pending approvals survive process
//! restarts.
//!
//! ## Quick Example
//!
//! ```no_run
//! use vigil_guard::ActionRecord;
//! use vigil_pipeline::{Disposition, GuardConfig, GuardPipeline, PipelineConfig};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = PipelineConfig::for_project(".");
//! let pipeline = GuardPipeline::open(&paths, &GuardConfig::default())?;
//!
//! let agent = pipeline.identities().provision(
//!     "report-summarizer",
//!     vec!["execute:read_file".to_string()],
//!     3600,
//! )?;
//! pipeline.tools().register("read_file", "execute:read_file", "ops")?;
//!
//! let action = ActionRecord::new(
//!     agent.agent_id,
//!     "summarize the quarterly report",
//!     "read_file",
//!     "reports/q3.pdf",
//! );
//! match pipeline.handle(&action) {
//!     Disposition::Allow => println!("execute it"),
//!     Disposition::Deny { reason } => println!("blocked: {reason}"),
//!     Disposition::PendingApproval { ticket_id } => println!("waiting on {ticket_id}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{ApprovalWindow, ContextBudget, GuardConfig, IntentThresholds, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{Disposition, GuardPipeline};
