// entry.rs — Audit entry data model.
//
// Every pipeline stage transition and every ticket resolution is recorded
// as an AuditEntry. Entries carry a monotonically increasing, gap-free
// sequence number and form a hash chain: each entry's `entry_hash` covers
// its own fields plus the previous entry's hash, so inserting, deleting,
// or editing any entry breaks the chain from that point on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hasher;

/// A single audit entry — one line in the JSONL ledger.
///
/// Immutable by contract: no update or delete operation exists anywhere
/// in this crate. The `entry_hash` is computed over the canonical payload
/// (all fields except `entry_hash` itself), so any field-level edit after
/// the fact is detectable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    /// Monotonically increasing, gap-free sequence number (starts at 0).
    pub seq: u64,

    /// When this entry was written (UTC).
    pub timestamp: DateTime<Utc>,

    /// The action this entry belongs to.
    pub action_id: Uuid,

    /// Which stage produced the entry (e.g., "intent_validator",
    /// "circuit_breaker", "disposition").
    pub stage: String,

    /// The verdict at this stage (e.g., "allow", "flag:high", "denied").
    pub verdict: String,

    /// Human-readable reason for the verdict.
    pub reason: String,

    /// Hash of the previous entry in the ledger. None for the first entry.
    pub previous_hash: Option<String>,

    /// SHA-256 over this entry's canonical payload (includes `previous_hash`).
    pub entry_hash: String,
}

/// The canonical hashable payload — every field of an entry except the
/// hash itself. Serialized with serde_json (derived structs serialize
/// fields in declaration order, so the byte stream is deterministic).
#[derive(Serialize)]
struct EntryPayload<'a> {
    seq: u64,
    timestamp: &'a DateTime<Utc>,
    action_id: &'a Uuid,
    stage: &'a str,
    verdict: &'a str,
    reason: &'a str,
    previous_hash: &'a Option<String>,
}

impl AuditEntry {
    /// Build an entry, computing its hash from its fields plus the
    /// previous entry's hash.
    pub fn new(
        seq: u64,
        action_id: Uuid,
        stage: impl Into<String>,
        verdict: impl Into<String>,
        reason: impl Into<String>,
        previous_hash: Option<String>,
    ) -> Self {
        let timestamp = Utc::now();
        let stage = stage.into();
        let verdict = verdict.into();
        let reason = reason.into();
        let entry_hash = compute_hash(
            seq,
            &timestamp,
            &action_id,
            &stage,
            &verdict,
            &reason,
            &previous_hash,
        );
        Self {
            seq,
            timestamp,
            action_id,
            stage,
            verdict,
            reason,
            previous_hash,
            entry_hash,
        }
    }

    /// Recompute the hash from the stored fields.
    ///
    /// Used by chain verification: if this differs from `entry_hash`,
    /// the entry was edited after it was written.
    pub fn recompute_hash(&self) -> String {
        compute_hash(
            self.seq,
            &self.timestamp,
            &self.action_id,
            &self.stage,
            &self.verdict,
            &self.reason,
            &self.previous_hash,
        )
    }
}

fn compute_hash(
    seq: u64,
    timestamp: &DateTime<Utc>,
    action_id: &Uuid,
    stage: &str,
    verdict: &str,
    reason: &str,
    previous_hash: &Option<String>,
) -> String {
    let payload = EntryPayload {
        seq,
        timestamp,
        action_id,
        stage,
        verdict,
        reason,
        previous_hash,
    };
    // Serializing a struct cannot fail for these field types.
    let json = serde_json::to_string(&payload).unwrap_or_default();
    hasher::hash_str(&json)
}
