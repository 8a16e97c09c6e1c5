// breaker.rs — CircuitBreaker: suspension, resolution, expiry sweep.
//
// Tickets are stored as JSON files: `<store_dir>/<ticket_id>.json`, one
// per ticket, reloaded on open so pending suspensions survive process
// restarts. The in-memory map is guarded by a Mutex; a resolution holds
// the lock across the state check, the audit append, and the persist, so
// two racing reviewers cannot both win the same ticket.
//
// Write-ahead ordering: the audit entry for a resolution is appended
// BEFORE the ticket file is rewritten. A crash between the two leaves an
// audit record with no matching ticket state, which replay surfaces; the
// reverse (a silent state change) cannot happen.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_audit::AuditLedger;
use vigil_guard::{ActionRecord, RiskLevel};

use crate::error::BreakerError;
use crate::ticket::{ApprovalTicket, TicketState};

/// Audit stage name under which the breaker records its decisions.
const AUDIT_STAGE: &str = "circuit_breaker";

/// Suspends high-risk actions into approval tickets and resolves them
/// exactly once.
pub struct CircuitBreaker {
    store_dir: PathBuf,
    ledger: Arc<AuditLedger>,
    max_wait_seconds: u64,
    tickets: Mutex<HashMap<Uuid, ApprovalTicket>>,
}

impl CircuitBreaker {
    /// Open a breaker backed by the given directory, reloading any
    /// persisted tickets. Creates the directory if needed.
    pub fn open(
        store_dir: impl AsRef<Path>,
        ledger: Arc<AuditLedger>,
        max_wait_seconds: u64,
    ) -> Result<Self, BreakerError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| BreakerError::Io {
            path: store_dir.clone(),
            source,
        })?;

        let mut tickets = HashMap::new();
        let entries = fs::read_dir(&store_dir).map_err(|source| BreakerError::Io {
            path: store_dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| BreakerError::Io {
                path: store_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| BreakerError::Io {
                    path: path.clone(),
                    source,
                })?;
                if let Ok(ticket) = serde_json::from_str::<ApprovalTicket>(&json) {
                    tickets.insert(ticket.ticket_id, ticket);
                }
            }
        }

        Ok(Self {
            store_dir,
            ledger,
            max_wait_seconds,
            tickets: Mutex::new(tickets),
        })
    }

    /// Suspend an action into a new PENDING ticket.
    ///
    /// The audit entry is written before the ticket is persisted, so the
    /// ledger never lags behind the ticket store.
    pub fn suspend(
        &self,
        action: ActionRecord,
        risk: RiskLevel,
        reason: impl Into<String>,
    ) -> Result<ApprovalTicket, BreakerError> {
        let ticket = ApprovalTicket::new(action, risk, reason);

        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        self.ledger.append(
            ticket.action.action_id,
            AUDIT_STAGE,
            "suspended",
            format!("ticket {} created: {}", ticket.ticket_id, ticket.reason),
        )?;
        self.persist(&ticket)?;
        tickets.insert(ticket.ticket_id, ticket.clone());
        drop(tickets);

        tracing::warn!(
            ticket_id = %ticket.ticket_id,
            action_id = %ticket.action.action_id,
            risk = %ticket.risk,
            "action suspended for approval"
        );
        Ok(ticket)
    }

    /// Approve a pending ticket. Exactly one resolution wins.
    pub fn approve(
        &self,
        ticket_id: Uuid,
        resolver: impl Into<String>,
    ) -> Result<ApprovalTicket, BreakerError> {
        self.resolve(ticket_id, TicketState::Approved, resolver.into())
    }

    /// Deny a pending ticket. Exactly one resolution wins.
    pub fn deny(
        &self,
        ticket_id: Uuid,
        resolver: impl Into<String>,
    ) -> Result<ApprovalTicket, BreakerError> {
        self.resolve(ticket_id, TicketState::Denied, resolver.into())
    }

    /// Current state of a ticket.
    pub fn status(&self, ticket_id: Uuid) -> Result<ApprovalTicket, BreakerError> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        tickets
            .get(&ticket_id)
            .cloned()
            .ok_or(BreakerError::NotFound(ticket_id))
    }

    /// Move every pending ticket past the approval window to EXPIRED.
    ///
    /// Returns the ids of the tickets expired by this sweep.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, BreakerError> {
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        let overdue: Vec<Uuid> = tickets
            .values()
            .filter(|t| t.is_overdue_at(now, self.max_wait_seconds))
            .map(|t| t.ticket_id)
            .collect();

        for ticket_id in &overdue {
            Self::resolve_locked(
                &mut tickets,
                &self.ledger,
                &self.store_dir,
                *ticket_id,
                TicketState::Expired,
                "system".to_string(),
            )?;
        }
        Ok(overdue)
    }

    /// Pending tickets, oldest first.
    pub fn pending(&self) -> Vec<ApprovalTicket> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<_> = tickets
            .values()
            .filter(|t| t.state == TicketState::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    fn resolve(
        &self,
        ticket_id: Uuid,
        target: TicketState,
        resolver: String,
    ) -> Result<ApprovalTicket, BreakerError> {
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Self::resolve_locked(
            &mut tickets,
            &self.ledger,
            &self.store_dir,
            ticket_id,
            target,
            resolver,
        )
    }

    // The state check, audit append, and persist happen under the table
    // lock in that order. `transition` is checked on a scratch copy first
    // so a failed audit write leaves the in-memory ticket untouched.
    fn resolve_locked(
        tickets: &mut HashMap<Uuid, ApprovalTicket>,
        ledger: &AuditLedger,
        store_dir: &Path,
        ticket_id: Uuid,
        target: TicketState,
        resolver: String,
    ) -> Result<ApprovalTicket, BreakerError> {
        let ticket = tickets
            .get(&ticket_id)
            .ok_or(BreakerError::NotFound(ticket_id))?;

        let mut resolved = ticket.clone();
        resolved.transition(target, resolver.clone())?;

        ledger.append(
            resolved.action.action_id,
            AUDIT_STAGE,
            target.to_string(),
            format!("ticket {ticket_id} resolved by {resolver}"),
        )?;

        let path = store_dir.join(format!("{ticket_id}.json"));
        let json = serde_json::to_string_pretty(&resolved)?;
        fs::write(&path, json).map_err(|source| BreakerError::Io { path, source })?;

        tickets.insert(ticket_id, resolved.clone());
        tracing::info!(
            ticket_id = %ticket_id,
            state = %target,
            resolver = %resolver,
            "ticket resolved"
        );
        Ok(resolved)
    }

    fn persist(&self, ticket: &ApprovalTicket) -> Result<(), BreakerError> {
        let path = self.store_dir.join(format!("{}.json", ticket.ticket_id));
        let json = serde_json::to_string_pretty(ticket)?;
        fs::write(&path, json).map_err(|source| BreakerError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn breaker(dir: &Path, max_wait: u64) -> CircuitBreaker {
        let ledger = Arc::new(AuditLedger::open(dir.join("audit.jsonl")).unwrap());
        CircuitBreaker::open(dir.join("tickets"), ledger, max_wait).unwrap()
    }

    fn action() -> ActionRecord {
        ActionRecord::new(Uuid::new_v4(), "wire funds", "send_payment", "acct-42")
    }

    #[test]
    fn suspend_then_approve() {
        let dir = tempdir().unwrap();
        let br = breaker(dir.path(), 300);

        let ticket = br.suspend(action(), RiskLevel::High, "intent mismatch").unwrap();
        assert_eq!(ticket.state, TicketState::Pending);

        let resolved = br.approve(ticket.ticket_id, "sec_eng_1").unwrap();
        assert_eq!(resolved.state, TicketState::Approved);
        assert_eq!(br.status(ticket.ticket_id).unwrap().state, TicketState::Approved);
    }

    #[test]
    fn approve_after_deny_is_rejected() {
        let dir = tempdir().unwrap();
        let br = breaker(dir.path(), 300);

        let ticket = br.suspend(action(), RiskLevel::High, "intent mismatch").unwrap();
        br.deny(ticket.ticket_id, "sec_eng_1").unwrap();

        let err = br.approve(ticket.ticket_id, "sec_eng_2").unwrap_err();
        assert!(matches!(err, BreakerError::InvalidTransition { .. }));
        let status = br.status(ticket.ticket_id).unwrap();
        assert_eq!(status.state, TicketState::Denied);
        assert_eq!(status.resolver.as_deref(), Some("sec_eng_1"));
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let dir = tempdir().unwrap();
        let br = breaker(dir.path(), 300);
        assert!(matches!(
            br.status(Uuid::new_v4()),
            Err(BreakerError::NotFound(_))
        ));
        assert!(matches!(
            br.approve(Uuid::new_v4(), "sec_eng_1"),
            Err(BreakerError::NotFound(_))
        ));
    }

    #[test]
    fn expiry_sweep_closes_overdue_tickets_only() {
        let dir = tempdir().unwrap();
        let br = breaker(dir.path(), 300);

        let overdue = br.suspend(action(), RiskLevel::High, "stale").unwrap();
        {
            let mut tickets = br.tickets.lock().unwrap();
            tickets.get_mut(&overdue.ticket_id).unwrap().created_at =
                Utc::now() - chrono::Duration::seconds(600);
        }
        let fresh = br.suspend(action(), RiskLevel::High, "fresh").unwrap();

        let expired = br.expire_overdue(Utc::now()).unwrap();
        assert_eq!(expired, vec![overdue.ticket_id]);
        assert_eq!(br.status(overdue.ticket_id).unwrap().state, TicketState::Expired);
        assert_eq!(br.status(fresh.ticket_id).unwrap().state, TicketState::Pending);

        // Expired is terminal.
        assert!(matches!(
            br.approve(overdue.ticket_id, "sec_eng_1"),
            Err(BreakerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn pending_tickets_survive_reopen() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(AuditLedger::open(dir.path().join("audit.jsonl")).unwrap());
        let store = dir.path().join("tickets");

        let ticket_id = {
            let br = CircuitBreaker::open(&store, Arc::clone(&ledger), 300).unwrap();
            br.suspend(action(), RiskLevel::High, "restart me")
                .unwrap()
                .ticket_id
        };

        let br = CircuitBreaker::open(&store, ledger, 300).unwrap();
        assert_eq!(br.status(ticket_id).unwrap().state, TicketState::Pending);
        let resolved = br.approve(ticket_id, "sec_eng_1").unwrap();
        assert_eq!(resolved.state, TicketState::Approved);
    }

    #[test]
    fn concurrent_resolutions_have_exactly_one_winner() {
        let dir = tempdir().unwrap();
        let br = Arc::new(breaker(dir.path(), 300));
        let ticket = br.suspend(action(), RiskLevel::High, "race").unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let br = Arc::clone(&br);
            let ticket_id = ticket.ticket_id;
            handles.push(std::thread::spawn(move || {
                if i % 2 == 0 {
                    br.approve(ticket_id, format!("reviewer_{i}")).is_ok()
                } else {
                    br.deny(ticket_id, format!("reviewer_{i}")).is_ok()
                }
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
        assert!(br.status(ticket.ticket_id).unwrap().state.is_terminal());
    }

    #[test]
    fn resolution_is_audited_before_state_change() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(AuditLedger::open(dir.path().join("audit.jsonl")).unwrap());
        let br = CircuitBreaker::open(dir.path().join("tickets"), Arc::clone(&ledger), 300).unwrap();

        let act = action();
        let action_id = act.action_id;
        let ticket = br.suspend(act, RiskLevel::High, "audit check").unwrap();
        br.deny(ticket.ticket_id, "sec_eng_1").unwrap();

        let timeline = ledger.replay(action_id).unwrap();
        let verdicts: Vec<&str> = timeline.iter().map(|e| e.verdict.as_str()).collect();
        assert_eq!(verdicts, vec!["suspended", "denied"]);
        ledger.verify_all().unwrap();
    }
}
