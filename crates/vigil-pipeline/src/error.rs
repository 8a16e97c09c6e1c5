// error.rs — Pipeline setup and orchestration errors.
//
// `handle` itself never returns these: any error reaching it is folded
// into a DENY disposition. They surface only from construction and from
// the management surface (provisioning, registration, resolution).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Identity(#[from] vigil_identity::IdentityError),

    #[error(transparent)]
    Tool(#[from] vigil_tools::ToolError),

    #[error(transparent)]
    Audit(#[from] vigil_audit::AuditError),

    #[error(transparent)]
    Breaker(#[from] vigil_breaker::BreakerError),

    #[error(transparent)]
    Guard(#[from] vigil_guard::GuardError),

    #[error("config read error at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
