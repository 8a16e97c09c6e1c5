// error.rs — Error types for the identity subsystem.
//
// Callers must be able to distinguish "never existed" from "was valid but
// is no longer", so expiry and revocation are separate variants rather
// than a generic lookup failure.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No identity with this id was ever provisioned.
    #[error("identity '{0}' not found")]
    NotFound(Uuid),

    /// The identity existed but its TTL has elapsed.
    #[error("identity '{0}' has expired")]
    Expired(Uuid),

    /// The identity existed but was revoked.
    #[error("identity '{0}' has been revoked")]
    Revoked(Uuid),

    /// A requested scope is not in the known scope vocabulary.
    #[error("invalid scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },

    /// Failed to read or write identity state on disk.
    #[error("identity store I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize an identity record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
