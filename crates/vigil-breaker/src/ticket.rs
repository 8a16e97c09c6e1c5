// ticket.rs — ApprovalTicket and its state machine.
//
// A ticket is created when the pipeline escalates a HIGH-risk action. It
// starts PENDING and resolves exactly once, to APPROVED, DENIED, or
// EXPIRED. All three resolved states are terminal: a ticket never moves
// again after it leaves PENDING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_guard::{ActionRecord, RiskLevel};

use crate::error::BreakerError;

/// Lifecycle state of an approval ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Awaiting a human decision. The suspended action stays blocked.
    Pending,
    /// A reviewer cleared the action for execution.
    Approved,
    /// A reviewer rejected the action.
    Denied,
    /// No decision arrived within the approval window.
    Expired,
}

impl TicketState {
    /// Whether this state may move to `target`.
    ///
    /// Only PENDING has outgoing edges; every resolved state is terminal.
    pub fn can_transition_to(&self, target: TicketState) -> bool {
        matches!(
            (self, target),
            (
                TicketState::Pending,
                TicketState::Approved | TicketState::Denied | TicketState::Expired
            )
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketState::Pending)
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketState::Pending => "pending",
            TicketState::Approved => "approved",
            TicketState::Denied => "denied",
            TicketState::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// A suspended high-risk action awaiting human review.
///
/// The full [`ActionRecord`] is embedded so a reviewer (and a restarted
/// process) sees exactly what was attempted, not just a summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub ticket_id: Uuid,
    /// The suspended action, verbatim.
    pub action: ActionRecord,
    /// Highest risk any stage assigned.
    pub risk: RiskLevel,
    /// Why the pipeline escalated (the flagging stages' reasons, joined).
    pub reason: String,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
    /// Set when the ticket leaves PENDING.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved it: a reviewer handle, or "system" for expiry.
    pub resolver: Option<String>,
}

impl ApprovalTicket {
    pub fn new(action: ActionRecord, risk: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            ticket_id: Uuid::new_v4(),
            action,
            risk,
            reason: reason.into(),
            state: TicketState::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            resolver: None,
        }
    }

    /// Move the ticket to `target`, recording when and by whom.
    ///
    /// Fails with [`BreakerError::InvalidTransition`] if the ticket has
    /// already been resolved.
    pub fn transition(
        &mut self,
        target: TicketState,
        resolver: impl Into<String>,
    ) -> Result<(), BreakerError> {
        if !self.state.can_transition_to(target) {
            return Err(BreakerError::InvalidTransition {
                ticket_id: self.ticket_id,
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.resolved_at = Some(Utc::now());
        self.resolver = Some(resolver.into());
        Ok(())
    }

    /// Whether the approval window has elapsed for a still-pending ticket.
    pub fn is_overdue_at(&self, now: DateTime<Utc>, max_wait_seconds: u64) -> bool {
        self.state == TicketState::Pending
            && now >= self.created_at + chrono::Duration::seconds(max_wait_seconds as i64)
    }
}
