//! # vigil-breaker
//!
//! The approval circuit breaker: when the pipeline flags an action HIGH,
//! the action does not fail and does not proceed — it is suspended into an
//! [`ApprovalTicket`] and waits for a human decision.
//!
//! Tickets resolve exactly once, to APPROVED, DENIED, or EXPIRED, and
//! every state change is written to the audit ledger before the ticket
//! store is touched. Tickets persist as JSON files so pending
//! suspensions survive a process restart and remain resolvable.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_audit::AuditLedger;
//! use vigil_breaker::CircuitBreaker;
//! use vigil_guard::{ActionRecord, RiskLevel};
//! use uuid::Uuid;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(AuditLedger::open(".vigil/audit.jsonl")?);
//! let breaker = CircuitBreaker::open(".vigil/tickets", ledger, 300)?;
//!
//! let action = ActionRecord::new(Uuid::new_v4(), "wire funds", "send_payment", "acct-42");
//! let ticket = breaker.suspend(action, RiskLevel::High, "intent mismatch")?;
//! let resolved = breaker.deny(ticket.ticket_id, "sec_eng_1")?;
//! println!("{}", resolved.state);
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod error;
pub mod ticket;

pub use breaker::CircuitBreaker;
pub use error::BreakerError;
pub use ticket::{ApprovalTicket, TicketState};
