// anomaly.rs — Behavioral Anomaly Detector.
//
// The one stage with cross-request state: a per-identity sliding window
// of recent action timestamps and failure marks. A burst of actions (or a
// spike in failures) inside the window flags HIGH and signals that the
// identity should be auto-revoked — a compromised or runaway agent is cut
// off instead of rate-limited.
//
// Counters live behind a Mutex keyed by identity, so concurrent requests
// for the same identity never lose increments.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_identity::AgentIdentity;
use vigil_tools::ToolRegistration;

use crate::action::ActionRecord;
use crate::error::GuardError;
use crate::verdict::{CheckStage, RiskLevel, Verdict};

/// Thresholds for the sliding-window heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Maximum actions allowed inside the window before flagging.
    pub max_actions: usize,
    /// Failure ratio (failures / actions) that flags, once enough
    /// samples exist.
    pub max_failure_ratio: f64,
    /// Minimum actions in the window before the failure ratio applies.
    pub min_samples: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            max_actions: 20,
            max_failure_ratio: 0.5,
            min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEvent {
    at: DateTime<Utc>,
    failed: bool,
}

/// The anomaly-detection stage.
pub struct AnomalyDetector {
    config: AnomalyConfig,
    windows: Mutex<HashMap<Uuid, VecDeque<WindowEvent>>>,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one action attempt for an identity and return the count of
    /// attempts and failures currently inside the window.
    fn observe(&self, agent_id: Uuid, now: DateTime<Utc>) -> (usize, usize) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(agent_id).or_default();

        Self::prune(window, now, self.config.window_seconds);
        window.push_back(WindowEvent { at: now, failed: false });

        let failures = window.iter().filter(|e| e.failed).count();
        (window.len(), failures)
    }

    /// Record a denied action for an identity and report whether the
    /// window now breaches a threshold.
    ///
    /// Called by the orchestrator for every DENY disposition, including
    /// the ones that never reach this stage (identity errors, unknown
    /// tools, scope mismatches), so a burst of denials is counted per
    /// action rather than only when the stage happens to run.
    pub fn record_failure(&self, agent_id: Uuid) -> bool {
        let now = Utc::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(agent_id).or_default();

        Self::prune(window, now, self.config.window_seconds);
        window.push_back(WindowEvent { at: now, failed: true });

        let attempts = window.len();
        let failures = window.iter().filter(|e| e.failed).count();
        attempts > self.config.max_actions
            || (attempts >= self.config.min_samples
                && failures as f64 / attempts as f64 >= self.config.max_failure_ratio)
    }

    fn prune(window: &mut VecDeque<WindowEvent>, now: DateTime<Utc>, window_seconds: u64) {
        let horizon = now - Duration::seconds(window_seconds as i64);
        while window.front().is_some_and(|e| e.at < horizon) {
            window.pop_front();
        }
    }

    /// Number of events currently tracked for an identity (testing and
    /// observability).
    pub fn window_len(&self, agent_id: Uuid) -> usize {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.get(&agent_id).map_or(0, |w| w.len())
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

impl CheckStage for AnomalyDetector {
    fn name(&self) -> &'static str {
        "anomaly_detector"
    }

    fn evaluate(
        &self,
        _action: &ActionRecord,
        identity: &AgentIdentity,
        _tool: &ToolRegistration,
    ) -> Result<Verdict, GuardError> {
        let (attempts, failures) = self.observe(identity.agent_id, Utc::now());

        if attempts > self.config.max_actions {
            tracing::warn!(
                agent_id = %identity.agent_id,
                attempts,
                window_seconds = self.config.window_seconds,
                "action rate anomaly"
            );
            return Ok(Verdict::flag(
                RiskLevel::High,
                format!(
                    "{} actions in {}s exceeds limit of {}",
                    attempts, self.config.window_seconds, self.config.max_actions
                ),
            ));
        }

        if attempts >= self.config.min_samples {
            let ratio = failures as f64 / attempts as f64;
            if ratio >= self.config.max_failure_ratio {
                tracing::warn!(
                    agent_id = %identity.agent_id,
                    failures,
                    attempts,
                    "failure rate anomaly"
                );
                return Ok(Verdict::flag(
                    RiskLevel::High,
                    format!(
                        "{}/{} recent actions failed (limit {:.0}%)",
                        failures,
                        attempts,
                        self.config.max_failure_ratio * 100.0
                    ),
                ));
            }
        }

        Ok(Verdict::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity() -> AgentIdentity {
        AgentIdentity {
            agent_id: Uuid::new_v4(),
            name: "test".to_string(),
            scopes: vec!["*".to_string()],
            issued_at: Utc::now(),
            ttl_seconds: 3600,
            revoked: false,
        }
    }

    fn tool() -> ToolRegistration {
        ToolRegistration {
            tool_name: "read_file".to_string(),
            required_scope: "execute:read_file".to_string(),
            registered_by: "test".to_string(),
            registered_at: Utc::now(),
        }
    }

    fn action(agent_id: Uuid) -> ActionRecord {
        ActionRecord::new(agent_id, "read files", "read_file", "file.txt")
    }

    #[test]
    fn quiet_identity_is_allowed() {
        let detector = AnomalyDetector::default();
        let id = identity();
        let verdict = detector
            .evaluate(&action(id.agent_id), &id, &tool())
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn burst_past_limit_flags_high() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            max_actions: 10,
            ..AnomalyConfig::default()
        });
        let id = identity();
        let mut last = Verdict::Allow;
        for _ in 0..12 {
            last = detector.evaluate(&action(id.agent_id), &id, &tool()).unwrap();
        }
        assert_eq!(last.risk(), Some(RiskLevel::High));
    }

    #[test]
    fn counts_are_per_identity() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            max_actions: 5,
            ..AnomalyConfig::default()
        });
        let noisy = identity();
        let quiet = identity();
        for _ in 0..7 {
            detector
                .evaluate(&action(noisy.agent_id), &noisy, &tool())
                .unwrap();
        }
        let verdict = detector
            .evaluate(&action(quiet.agent_id), &quiet, &tool())
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn failure_ratio_flags_high() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            max_actions: 100,
            max_failure_ratio: 0.5,
            min_samples: 4,
            ..AnomalyConfig::default()
        });
        let id = identity();
        // Three failures, then a fourth attempt → ratio 0.75 over 4 samples.
        for _ in 0..3 {
            detector.record_failure(id.agent_id);
        }
        let verdict = detector
            .evaluate(&action(id.agent_id), &id, &tool())
            .unwrap();
        assert_eq!(verdict.risk(), Some(RiskLevel::High));
    }

    #[test]
    fn record_failure_counts_denied_actions_toward_the_window() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            max_actions: 100,
            max_failure_ratio: 0.5,
            min_samples: 4,
            ..AnomalyConfig::default()
        });
        let id = identity();
        // Below min_samples the ratio does not apply.
        assert!(!detector.record_failure(id.agent_id));
        assert!(!detector.record_failure(id.agent_id));
        assert!(!detector.record_failure(id.agent_id));
        // Fourth denial: 4/4 failed, ratio 1.0 breaches.
        assert!(detector.record_failure(id.agent_id));
        assert_eq!(detector.window_len(id.agent_id), 4);
    }

    #[test]
    fn record_failure_reports_rate_breach_without_the_stage_running() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            max_actions: 5,
            max_failure_ratio: 1.1, // ratio rule disabled; rate rule only
            ..AnomalyConfig::default()
        });
        let id = identity();
        let mut breached = false;
        for _ in 0..6 {
            breached = detector.record_failure(id.agent_id);
        }
        assert!(breached);
    }

    #[test]
    fn old_events_fall_out_of_the_window() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            window_seconds: 60,
            max_actions: 5,
            ..AnomalyConfig::default()
        });
        let id = identity();
        // Seed stale events directly, older than the window.
        {
            let mut windows = detector.windows.lock().unwrap();
            let window = windows.entry(id.agent_id).or_default();
            for _ in 0..10 {
                window.push_back(WindowEvent {
                    at: Utc::now() - Duration::seconds(120),
                    failed: false,
                });
            }
        }
        let verdict = detector
            .evaluate(&action(id.agent_id), &id, &tool())
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(detector.window_len(id.agent_id), 1);
    }

    #[test]
    fn concurrent_observations_lose_no_increments() {
        let detector = Arc::new(AnomalyDetector::new(AnomalyConfig {
            window_seconds: 3600,
            max_actions: 10_000,
            ..AnomalyConfig::default()
        }));
        let id = identity();
        let agent_id = id.agent_id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let detector = Arc::clone(&detector);
            let id = id.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    detector.evaluate(&action(agent_id), &id, &tool()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(detector.window_len(agent_id), 400);
    }
}
