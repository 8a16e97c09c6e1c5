// error.rs — Error types for the circuit breaker.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::ticket::TicketState;

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("ticket not found: {0}")]
    NotFound(Uuid),

    /// The requested state change is not allowed from the ticket's
    /// current state (e.g., approving an already-denied ticket).
    #[error("ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidTransition {
        ticket_id: Uuid,
        from: TicketState,
        to: TicketState,
    },

    /// The audit entry for a resolution could not be written. The
    /// resolution is abandoned: no audit record means no state change.
    #[error("audit write failed: {0}")]
    Audit(#[from] vigil_audit::AuditError),

    #[error("ticket store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ticket serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
