//! # vigil-identity
//!
//! Ephemeral agent identities for Vigil.
//!
//! Agents never act anonymously: before the guard pipeline will consider
//! an action, the acting identity must have been provisioned with explicit
//! scopes and a TTL. Identities are usable only while unexpired and
//! unrevoked; expiry is derived from the issuance time, never stored.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use vigil_identity::{IdentityRegistry, ScopeVocabulary};
//!
//! let registry =
//!     IdentityRegistry::open("/tmp/identities", ScopeVocabulary::default()).unwrap();
//! let identity = registry
//!     .provision("report-reader", vec!["execute:read_file".to_string()], 3600)
//!     .unwrap();
//! assert!(registry.resolve(identity.agent_id).is_ok());
//! ```

pub mod error;
pub mod identity;
pub mod registry;

pub use error::IdentityError;
pub use identity::{AgentIdentity, ScopeVocabulary, WILDCARD_SCOPE};
pub use registry::IdentityRegistry;
