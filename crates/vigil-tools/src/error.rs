// error.rs — Error types for the tool registry.

use thiserror::Error;

/// Errors that can occur during tool registry operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A tool with this name is already registered. Use the explicit
    /// re-registration path to update it.
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    /// No tool with this name is registered. The orchestrator treats this
    /// as an unconditional deny — unregistered tools are never executable.
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// Tool names must be filesystem-safe identifiers.
    #[error("invalid tool name '{0}': expected [A-Za-z0-9_.-]+")]
    InvalidName(String),

    /// Failed to read or write registry state on disk.
    #[error("tool store I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize a registration record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
