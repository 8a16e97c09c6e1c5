//! # vigil-tools
//!
//! Explicit tool registrations for Vigil.
//!
//! Only tools registered here are ever executable. The guard pipeline
//! treats a lookup miss as an unconditional deny before any check stage
//! runs — default-deny at the tool level, independent of identity scopes.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use vigil_tools::ToolRegistry;
//!
//! let registry = ToolRegistry::open("/tmp/tools").unwrap();
//! registry.register("read_file", "execute:read_file", "operator").unwrap();
//! assert!(registry.lookup("read_file").is_ok());
//! assert!(registry.lookup("delete_file").is_err());
//! ```

pub mod error;
pub mod registry;

pub use error::ToolError;
pub use registry::{ToolRegistration, ToolRegistry};
