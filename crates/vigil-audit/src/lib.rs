//! # vigil-audit
//!
//! Hash-chained, sequence-numbered audit ledger for Vigil.
//!
//! Every pipeline stage transition and every approval-ticket resolution is
//! recorded as an [`AuditEntry`] in a JSONL ledger. Entries carry gap-free
//! sequence numbers and a SHA-256 hash chain, so any tampering (insert,
//! delete, or edit) is detectable with [`AuditLedger::verify_chain`].
//!
//! The ledger is write-only from the rest of the system's point of view:
//! components append decisions but never read entries back to make them.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use uuid::Uuid;
//! use vigil_audit::AuditLedger;
//!
//! let ledger = AuditLedger::open("/tmp/ledger.jsonl").unwrap();
//! ledger
//!     .append(Uuid::new_v4(), "intent_validator", "allow", "aligned with intent")
//!     .unwrap();
//! ledger.verify_all().unwrap();
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod ledger;

pub use entry::AuditEntry;
pub use error::AuditError;
pub use ledger::AuditLedger;
