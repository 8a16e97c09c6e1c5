// pipeline.rs — GuardPipeline: the orchestrator.
//
// One entry point, `handle`, takes an ActionRecord through the full
// sequence: identity resolution, tool lookup and scope check, the four
// check stages in fixed order, risk aggregation, and either release,
// denial, or suspension into an approval ticket. Every step writes an
// audit entry; the last entry for an action is always its disposition.
//
// The pipeline is default-deny throughout: any error anywhere folds into
// DENY. Nothing ever defaults to ALLOW.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_audit::AuditLedger;
use vigil_breaker::CircuitBreaker;
use vigil_guard::{
    scope_covers, ActionRecord, AnomalyDetector, CheckStage, ContextGovernor, IntentValidator,
    ProvenanceFirewall, RiskLevel, Verdict,
};
use vigil_identity::{IdentityRegistry, ScopeVocabulary};
use vigil_tools::ToolRegistry;

use crate::config::{GuardConfig, PipelineConfig};
use crate::error::PipelineError;

/// The pipeline's final word on one action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// The action may execute.
    Allow,
    /// The action is blocked.
    Deny { reason: String },
    /// The action is suspended; poll the breaker with the ticket id.
    PendingApproval { ticket_id: Uuid },
}

/// The guard pipeline. Shareable across worker threads behind an `Arc`;
/// every method takes `&self`.
pub struct GuardPipeline {
    identities: Arc<IdentityRegistry>,
    tools: Arc<ToolRegistry>,
    ledger: Arc<AuditLedger>,
    breaker: Arc<CircuitBreaker>,
    anomaly: Arc<AnomalyDetector>,
    stages: Vec<Arc<dyn CheckStage>>,
}

impl GuardPipeline {
    /// Open a pipeline: all stores are created or reloaded, stages are
    /// built from the guard config.
    pub fn open(paths: &PipelineConfig, guard: &GuardConfig) -> Result<Self, PipelineError> {
        let vocabulary = if guard.scope_categories.is_empty() {
            ScopeVocabulary::default()
        } else {
            ScopeVocabulary::new(guard.scope_categories.iter().cloned())
        };

        let identities = Arc::new(IdentityRegistry::open(&paths.identities_dir, vocabulary)?);
        let tools = Arc::new(ToolRegistry::open(&paths.tools_dir)?);
        let ledger = Arc::new(AuditLedger::open(&paths.audit_log)?);
        let breaker = Arc::new(CircuitBreaker::open(
            &paths.tickets_dir,
            Arc::clone(&ledger),
            guard.approval.max_wait_seconds,
        )?);

        let anomaly = Arc::new(AnomalyDetector::new(guard.anomaly.clone()));
        let stages: Vec<Arc<dyn CheckStage>> = vec![
            Arc::new(IntentValidator::new(
                guard.intent.medium_threshold,
                guard.intent.high_threshold,
            )),
            Arc::new(ProvenanceFirewall::new()),
            Arc::new(ContextGovernor::new(
                guard.context.max_tokens,
                guard.context.overflow_policy,
            )),
            Arc::clone(&anomaly) as Arc<dyn CheckStage>,
        ];

        Ok(Self {
            identities,
            tools,
            ledger,
            breaker,
            anomaly,
            stages,
        })
    }

    /// Take one action through the pipeline.
    ///
    /// Never fails open: an internal error anywhere becomes a DENY. An
    /// ALLOW or PENDING_APPROVAL is only returned once its audit entries
    /// are durably written; if the ledger refuses them the action is
    /// denied instead.
    pub fn handle(&self, action: &ActionRecord) -> Disposition {
        let disposition = match self.evaluate(action) {
            Ok(disposition) => disposition,
            Err(e) => self.fail_closed(action, &e),
        };
        if let Disposition::Deny { .. } = disposition {
            self.register_denial(action);
        }
        disposition
    }

    fn evaluate(&self, action: &ActionRecord) -> Result<Disposition, PipelineError> {
        // 1. Identity. NotFound, Expired, and Revoked each deny with
        // their own reason.
        let identity = match self.identities.resolve(action.agent_id) {
            Ok(identity) => identity,
            Err(e) => return Ok(self.deny(action, "identity_registry", e.to_string())),
        };

        // 2. Tool lookup, then scope coverage. Unregistered tools deny:
        // nothing executes that was never registered.
        let tool = match self.tools.lookup(&action.tool_name) {
            Ok(tool) => tool,
            Err(e) => return Ok(self.deny(action, "tool_registry", e.to_string())),
        };
        let scoped = identity
            .scopes
            .iter()
            .any(|s| scope_covers(s, &tool.required_scope));
        if !scoped {
            return Ok(self.deny(
                action,
                "tool_registry",
                format!(
                    "tool '{}' requires scope '{}' the identity lacks",
                    tool.tool_name, tool.required_scope
                ),
            ));
        }
        self.ledger
            .append(action.action_id, "tool_registry", "allow", "scope check passed")?;

        // 3. Check stages in fixed order. Each verdict is audited; a
        // HIGH flag short-circuits the rest.
        let mut highest: Option<(RiskLevel, String, &'static str)> = None;
        for stage in &self.stages {
            let verdict = match stage.evaluate(action, &identity, &tool) {
                Ok(v) => v,
                Err(e) => {
                    return Ok(self.deny(
                        action,
                        stage.name(),
                        format!("internal_evaluation_failure: {e}"),
                    ));
                }
            };
            self.ledger
                .append(action.action_id, stage.name(), verdict.label(), verdict.reason())?;

            if let Verdict::Flag { risk, reason } = verdict {
                let tops = match &highest {
                    None => true,
                    Some((r, _, _)) => risk > *r,
                };
                if tops {
                    highest = Some((risk, reason, stage.name()));
                }
                if risk == RiskLevel::High {
                    break;
                }
            }
        }

        // 4. An anomaly HIGH means the identity itself is no longer
        // trusted: revoke it before deciding the action.
        if let Some((RiskLevel::High, reason, "anomaly_detector")) = highest
            .as_ref()
            .map(|(r, reason, name)| (*r, reason.clone(), *name))
        {
            if let Err(e) = self.identities.revoke(action.agent_id) {
                return Ok(self.deny(
                    action,
                    "anomaly_detector",
                    format!("internal_evaluation_failure: {e}"),
                ));
            }
            self.ledger.append(
                action.action_id,
                "anomaly_detector",
                "auto_revoked",
                format!("identity revoked: {reason}"),
            )?;
            return Ok(self.deny(action, "disposition", format!("anomalous behavior: {reason}")));
        }

        // 5. Aggregate. HIGH suspends into the breaker; MEDIUM/LOW pass
        // with their audit trail.
        match highest {
            Some((RiskLevel::High, reason, stage)) => {
                let full_reason = format!("{stage}: {reason}");
                match self
                    .breaker
                    .suspend(action.clone(), RiskLevel::High, full_reason)
                {
                    Ok(ticket) => {
                        self.ledger.append(
                            action.action_id,
                            "disposition",
                            "pending_approval",
                            format!("ticket {}", ticket.ticket_id),
                        )?;
                        Ok(Disposition::PendingApproval {
                            ticket_id: ticket.ticket_id,
                        })
                    }
                    Err(e) => Ok(self.deny(
                        action,
                        "circuit_breaker",
                        format!("internal_evaluation_failure: {e}"),
                    )),
                }
            }
            Some((risk, reason, stage)) => {
                self.ledger.append(
                    action.action_id,
                    "disposition",
                    "allow",
                    format!("released with {risk} flag from {stage}: {reason}"),
                )?;
                Ok(Disposition::Allow)
            }
            None => {
                self.ledger
                    .append(action.action_id, "disposition", "allow", "all stages passed")?;
                Ok(Disposition::Allow)
            }
        }
    }

    // A failed ledger write (or any other internal error) on a path that
    // was heading toward ALLOW or PENDING_APPROVAL lands here and folds
    // into DENY. The deny audit itself is best-effort: even an unwritable
    // ledger never flips the decision open.
    fn fail_closed(&self, action: &ActionRecord, e: &PipelineError) -> Disposition {
        self.deny(
            action,
            "pipeline",
            format!("internal_evaluation_failure: {e}"),
        )
    }

    // Every denial counts against the identity's failure window, no
    // matter which step produced it. A breach revokes the identity, the
    // same response the anomaly stage gives a burst of allowed actions.
    fn register_denial(&self, action: &ActionRecord) {
        if !self.anomaly.record_failure(action.agent_id) {
            return;
        }
        // Already-revoked (or unknown) identities have nothing left to
        // revoke; skip the audit noise.
        if self.identities.resolve(action.agent_id).is_err() {
            return;
        }
        if self.identities.revoke(action.agent_id).is_ok() {
            self.audit(
                action,
                "anomaly_detector",
                "auto_revoked",
                "denial rate anomaly; identity revoked",
            );
            tracing::warn!(
                agent_id = %action.agent_id,
                "identity revoked after a burst of denials"
            );
        }
    }

    fn deny(&self, action: &ActionRecord, stage: &str, reason: String) -> Disposition {
        self.audit(action, stage, "deny", reason.as_str());
        if stage != "disposition" {
            self.audit(action, "disposition", "deny", reason.as_str());
        }
        tracing::warn!(
            action_id = %action.action_id,
            agent_id = %action.agent_id,
            stage,
            reason = %reason,
            "action denied"
        );
        Disposition::Deny { reason }
    }

    // Best-effort append for deny paths only: the decision is already
    // DENY, so a failed write is logged rather than recursed on. Allow
    // and pending paths write through the ledger directly and propagate.
    fn audit(
        &self,
        action: &ActionRecord,
        stage: &str,
        verdict: impl Into<String>,
        reason: impl Into<String>,
    ) {
        if let Err(e) = self
            .ledger
            .append(action.action_id, stage, verdict, reason)
        {
            tracing::error!(
                action_id = %action.action_id,
                stage,
                error = %e,
                "audit append failed"
            );
        }
    }

    /// Identity provisioning, resolution, and revocation surface.
    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// Tool registration surface.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The shared audit ledger (replay, verification).
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Ticket approval, denial, status, and expiry surface.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
