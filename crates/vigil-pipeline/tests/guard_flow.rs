// guard_flow.rs — Vertical-slice tests for the full pipeline:
// identity provisioning, tool registration, stage evaluation, the
// approval circuit breaker, and the audit trail, all against real
// on-disk state in a temp directory.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use vigil_breaker::{BreakerError, TicketState};
use vigil_guard::ActionRecord;
use vigil_pipeline::{Disposition, GuardConfig, GuardPipeline, PipelineConfig};

fn pipeline_at(root: &Path, guard: &GuardConfig) -> GuardPipeline {
    let paths = PipelineConfig::for_project(root);
    GuardPipeline::open(&paths, guard).unwrap()
}

fn ticket_id(disposition: &Disposition) -> uuid::Uuid {
    match disposition {
        Disposition::PendingApproval { ticket_id } => *ticket_id,
        other => panic!("expected PendingApproval, got {other:?}"),
    }
}

/// An in-scope, intent-consistent tool call is released, and the audit
/// trail ends with an allow disposition.
#[test]
fn scenario_scoped_read_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("summarizer", vec!["execute:read_file".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("read_file", "execute:read_file", "ops")
        .unwrap();

    let action = ActionRecord::new(
        agent.agent_id,
        "read the quarterly report file",
        "read_file",
        "reports/q3_report.txt",
    );
    assert_eq!(pipeline.handle(&action), Disposition::Allow);

    let timeline = pipeline.ledger().replay(action.action_id).unwrap();
    let last = timeline.last().unwrap();
    assert_eq!(last.stage, "disposition");
    assert_eq!(last.verdict, "allow");
    pipeline.ledger().verify_all().unwrap();
}

/// A tool nobody registered is denied no matter who calls it.
#[test]
fn scenario_unregistered_tool_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("rogue", vec!["*".to_string()], 3600)
        .unwrap();

    let action = ActionRecord::new(agent.agent_id, "delete everything", "rm_rf", "/");
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => assert!(reason.contains("not found"), "{reason}"),
        other => panic!("expected Deny, got {other:?}"),
    }
}

/// An unknown identity is denied before any stage runs.
#[test]
fn scenario_unknown_identity_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());
    pipeline
        .tools()
        .register("read_file", "execute:read_file", "ops")
        .unwrap();

    let action = ActionRecord::new(uuid::Uuid::new_v4(), "read a file", "read_file", "a.txt");
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => assert!(reason.contains("not found"), "{reason}"),
        other => panic!("expected Deny, got {other:?}"),
    }
}

/// A registered tool the identity has no scope for is denied.
#[test]
fn scenario_scope_mismatch_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("reader", vec!["execute:read_file".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("send_payment", "api:send_payment", "ops")
        .unwrap();

    let action = ActionRecord::new(
        agent.agent_id,
        "send the payment",
        "send_payment",
        "acct-42",
    );
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => {
            assert!(reason.contains("api:send_payment"), "{reason}")
        }
        other => panic!("expected Deny, got {other:?}"),
    }
}

/// An identity past its TTL is denied at the front door, with the expiry
/// as the recorded reason.
#[test]
fn scenario_expired_identity_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("short_lived", vec!["execute:read_file".to_string()], 0)
        .unwrap();
    pipeline
        .tools()
        .register("read_file", "execute:read_file", "ops")
        .unwrap();

    let action = ActionRecord::new(agent.agent_id, "read a file", "read_file", "a.txt");
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => assert!(reason.contains("has expired"), "{reason}"),
        other => panic!("expected Deny, got {other:?}"),
    }

    let timeline = pipeline.ledger().replay(action.action_id).unwrap();
    assert_eq!(timeline.last().unwrap().verdict, "deny");
    pipeline.ledger().verify_all().unwrap();
}

/// Denials that never reach the check stages (here: an unregistered
/// tool) still count against the identity's failure window, and a burst
/// of them revokes the identity.
#[test]
fn denial_burst_revokes_the_identity() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("fumbler", vec!["execute:read_file".to_string()], 3600)
        .unwrap();

    for _ in 0..10 {
        let action = ActionRecord::new(agent.agent_id, "read a file", "no_such_tool", "a.txt");
        assert!(matches!(
            pipeline.handle(&action),
            Disposition::Deny { .. }
        ));
    }
    assert!(pipeline.identities().resolve(agent.agent_id).is_err());

    // The revocation is on the record.
    let entries = pipeline.ledger().read_all().unwrap();
    assert!(entries
        .iter()
        .any(|e| e.stage == "anomaly_detector" && e.verdict == "auto_revoked"));

    // And the next attempt is denied for the revocation itself.
    let action = ActionRecord::new(agent.agent_id, "read a file", "no_such_tool", "a.txt");
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => assert!(reason.contains("revoked"), "{reason}"),
        other => panic!("expected Deny, got {other:?}"),
    }
    pipeline.ledger().verify_all().unwrap();
}

/// A high-risk action is suspended, a reviewer denies it, and the losing
/// approval is rejected without disturbing the recorded decision.
#[test]
fn scenario_high_risk_suspends_and_resolves_once() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("assistant", vec!["*".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("send_payment", "api:send_payment", "ops")
        .unwrap();

    // Declared intent shares no vocabulary with the attempted action, so
    // the intent validator flags HIGH.
    let action = ActionRecord::new(
        agent.agent_id,
        "summarize the quarterly report",
        "send_payment",
        "acct-999",
    );
    let disposition = pipeline.handle(&action);
    let ticket = ticket_id(&disposition);
    assert_eq!(
        pipeline.breaker().status(ticket).unwrap().state,
        TicketState::Pending
    );

    let denied = pipeline.breaker().deny(ticket, "sec_eng_1").unwrap();
    assert_eq!(denied.state, TicketState::Denied);

    let err = pipeline.breaker().approve(ticket, "sec_eng_2").unwrap_err();
    assert!(matches!(err, BreakerError::InvalidTransition { .. }));
    let status = pipeline.breaker().status(ticket).unwrap();
    assert_eq!(status.state, TicketState::Denied);
    assert_eq!(status.resolver.as_deref(), Some("sec_eng_1"));
}

/// The expiry sweep closes overdue tickets as an implicit deny, and an
/// expired ticket cannot be approved afterward.
#[test]
fn scenario_overdue_ticket_expires() {
    let dir = tempfile::tempdir().unwrap();
    let mut guard = GuardConfig::default();
    guard.approval.max_wait_seconds = 0;
    let pipeline = pipeline_at(dir.path(), &guard);

    let agent = pipeline
        .identities()
        .provision("assistant", vec!["*".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("send_payment", "api:send_payment", "ops")
        .unwrap();

    let action = ActionRecord::new(
        agent.agent_id,
        "summarize the quarterly report",
        "send_payment",
        "acct-999",
    );
    let ticket = ticket_id(&pipeline.handle(&action));

    let expired = pipeline.breaker().expire_overdue(Utc::now()).unwrap();
    assert_eq!(expired, vec![ticket]);
    assert_eq!(
        pipeline.breaker().status(ticket).unwrap().state,
        TicketState::Expired
    );
    assert!(matches!(
        pipeline.breaker().approve(ticket, "sec_eng_1"),
        Err(BreakerError::InvalidTransition { .. })
    ));
}

/// A pending ticket survives a process restart and is still resolvable.
#[test]
fn pending_ticket_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let ticket = {
        let pipeline = pipeline_at(dir.path(), &GuardConfig::default());
        let agent = pipeline
            .identities()
            .provision("assistant", vec!["*".to_string()], 3600)
            .unwrap();
        pipeline
            .tools()
            .register("send_payment", "api:send_payment", "ops")
            .unwrap();
        let action = ActionRecord::new(
            agent.agent_id,
            "summarize the quarterly report",
            "send_payment",
            "acct-999",
        );
        ticket_id(&pipeline.handle(&action))
    };

    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());
    assert_eq!(
        pipeline.breaker().status(ticket).unwrap().state,
        TicketState::Pending
    );
    let approved = pipeline.breaker().approve(ticket, "sec_eng_1").unwrap();
    assert_eq!(approved.state, TicketState::Approved);
    pipeline.ledger().verify_all().unwrap();
}

/// Racing reviewers: exactly one resolution wins the ticket.
#[test]
fn concurrent_resolutions_race_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(pipeline_at(dir.path(), &GuardConfig::default()));

    let agent = pipeline
        .identities()
        .provision("assistant", vec!["*".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("send_payment", "api:send_payment", "ops")
        .unwrap();
    let action = ActionRecord::new(
        agent.agent_id,
        "summarize the quarterly report",
        "send_payment",
        "acct-999",
    );
    let ticket = ticket_id(&pipeline.handle(&action));

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(std::thread::spawn(move || {
            if i % 2 == 0 {
                pipeline.breaker().approve(ticket, format!("rev_{i}")).is_ok()
            } else {
                pipeline.breaker().deny(ticket, format!("rev_{i}")).is_ok()
            }
        }));
    }
    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(wins, 1);
    pipeline.ledger().verify_all().unwrap();
}

/// Every decision a batch of actions produces is replayable from the
/// ledger, and the whole chain verifies.
#[test]
fn ledger_replays_every_decision() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(dir.path(), &GuardConfig::default());

    let agent = pipeline
        .identities()
        .provision("summarizer", vec!["execute:read_file".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("read_file", "execute:read_file", "ops")
        .unwrap();

    let mut action_ids = Vec::new();
    for i in 0..5 {
        let action = ActionRecord::new(
            agent.agent_id,
            "read the report files",
            "read_file",
            format!("reports/file_{i}.txt"),
        );
        pipeline.handle(&action);
        action_ids.push(action.action_id);
    }

    for action_id in action_ids {
        let timeline = pipeline.ledger().replay(action_id).unwrap();
        assert!(!timeline.is_empty());
        assert_eq!(timeline.last().unwrap().stage, "disposition");
        // Seq strictly increases within a replay.
        for pair in timeline.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
        }
    }
    pipeline.ledger().verify_all().unwrap();
}

/// A burst of actions from one identity trips the anomaly detector,
/// revokes the identity, and denies everything that follows.
#[test]
fn anomaly_burst_revokes_the_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mut guard = GuardConfig::default();
    guard.anomaly.max_actions = 5;
    let pipeline = pipeline_at(dir.path(), &guard);

    let agent = pipeline
        .identities()
        .provision("runaway", vec!["execute:read_file".to_string()], 3600)
        .unwrap();
    pipeline
        .tools()
        .register("read_file", "execute:read_file", "ops")
        .unwrap();

    let mut denied = false;
    for i in 0..10 {
        let action = ActionRecord::new(
            agent.agent_id,
            "read the report files",
            "read_file",
            format!("reports/file_{i}.txt"),
        );
        if let Disposition::Deny { reason } = pipeline.handle(&action) {
            denied = true;
            assert!(
                reason.contains("anomalous") || reason.contains("revoked"),
                "{reason}"
            );
        }
    }
    assert!(denied);

    // The identity is now revoked; even a single calm request is denied.
    let action = ActionRecord::new(agent.agent_id, "read the report files", "read_file", "a.txt");
    match pipeline.handle(&action) {
        Disposition::Deny { reason } => assert!(reason.contains("revoked"), "{reason}"),
        other => panic!("expected Deny, got {other:?}"),
    }
    pipeline.ledger().verify_all().unwrap();
}
