// ledger.rs — Append-only JSONL audit ledger.
//
// The ledger is stored as a JSONL (JSON Lines) file: one entry per line.
// This format is append-friendly and easy to inspect with standard tools
// (jq, grep, etc.).
//
// Sequence numbers are assigned under the ledger's internal lock, so they
// are strictly ordered and gap-free even when many in-flight requests
// append concurrently. Each entry is chained to the previous one by hash;
// `verify_chain` detects any insertion, deletion, or edit.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::entry::AuditEntry;
use crate::error::AuditError;

/// An append-only, hash-chained audit ledger backed by a JSONL file.
///
/// All mutating state lives behind a `Mutex`, so the ledger is shared
/// across worker threads behind an `Arc` and takes `&self` everywhere.
/// Appends flush before returning: no decision is observable to callers
/// until its entry is durable.
pub struct AuditLedger {
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

struct LedgerInner {
    writer: BufWriter<File>,
    /// Sequence number the next entry will receive.
    next_seq: u64,
    /// Hash of the last entry written — chains the next entry.
    last_hash: Option<String>,
}

impl AuditLedger {
    /// Open (or create) a ledger at the given path.
    ///
    /// If the file already exists, the last entry is read back to recover
    /// the sequence counter and the chain head, so new entries link
    /// correctly across process restarts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let (next_seq, last_hash) = if path.exists() {
            match Self::read_last_entry(&path)? {
                Some(last) => (last.seq + 1, Some(last.entry_hash)),
                None => (0, None),
            }
        } else {
            (0, None)
        };

        // Append mode — existing data is never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            inner: Mutex::new(LedgerInner {
                writer: BufWriter::new(file),
                next_seq,
                last_hash,
            }),
        })
    }

    /// Append an entry to the ledger and return it.
    ///
    /// Assigns the next sequence number, chains the entry to the previous
    /// one, writes the JSON line, and flushes to disk before returning.
    pub fn append(
        &self,
        action_id: Uuid,
        stage: impl Into<String>,
        verdict: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<AuditEntry, AuditError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let entry = AuditEntry::new(
            inner.next_seq,
            action_id,
            stage,
            verdict,
            reason,
            inner.last_hash.clone(),
        );

        let json = serde_json::to_string(&entry)?;
        writeln!(inner.writer, "{}", json)?;
        inner.writer.flush()?;

        inner.next_seq = entry.seq + 1;
        inner.last_hash = Some(entry.entry_hash.clone());

        Ok(entry)
    }

    /// Read all entries, oldest first. Skips blank lines gracefully.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        // Hold the lock so a concurrent append cannot leave a torn line.
        let _guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::read_entries(&self.path)
    }

    /// Reconstruct the full decision timeline for one action, ordered by
    /// sequence number.
    ///
    /// The returned entries are sufficient to reproduce every stage's
    /// verdict and the final disposition for that action without
    /// consulting any other component.
    pub fn replay(&self, action_id: Uuid) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.read_all()?;
        Ok(entries
            .into_iter()
            .filter(|e| e.action_id == action_id)
            .collect())
    }

    /// Verify the hash chain over an inclusive sequence range.
    ///
    /// Recomputes every entry's hash from its stored fields, checks the
    /// link to the preceding entry, and checks that sequence numbers are
    /// contiguous. Returns the first break found.
    pub fn verify_chain(&self, from: u64, to: u64) -> Result<(), AuditError> {
        let entries = self.read_all()?;
        let len = entries.len() as u64;
        if from > to || to >= len {
            return Err(AuditError::RangeOutOfBounds { from, to, len });
        }

        // Sequence numbers must equal file positions: the file starts at
        // seq 0 and has no gaps, so entry i must carry seq i.
        for (i, entry) in entries.iter().enumerate() {
            if entry.seq != i as u64 {
                tracing::error!(
                    expected = i as u64,
                    found = entry.seq,
                    "audit ledger sequence gap"
                );
                return Err(AuditError::SequenceGap {
                    expected: i as u64,
                    found: entry.seq,
                });
            }
        }

        for entry in &entries[from as usize..=to as usize] {
            if entry.recompute_hash() != entry.entry_hash {
                tracing::error!(seq = entry.seq, "audit entry hash mismatch");
                return Err(AuditError::ChainVerificationFailure {
                    seq: entry.seq,
                    detail: "entry content does not match its stored hash".to_string(),
                });
            }
            let expected_prev = if entry.seq == 0 {
                None
            } else {
                Some(entries[(entry.seq - 1) as usize].entry_hash.clone())
            };
            if entry.previous_hash != expected_prev {
                tracing::error!(seq = entry.seq, "audit chain link broken");
                return Err(AuditError::ChainVerificationFailure {
                    seq: entry.seq,
                    detail: "previous-hash link does not match preceding entry".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Verify the hash chain over the whole ledger.
    ///
    /// An empty ledger is trivially valid.
    pub fn verify_all(&self) -> Result<(), AuditError> {
        let len = self.read_all()?.len() as u64;
        if len == 0 {
            return Ok(());
        }
        self.verify_chain(0, len - 1)
    }

    /// The sequence number the next appended entry will receive.
    pub fn next_seq(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).next_seq
    }

    /// Path to the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn read_last_entry(path: &Path) -> Result<Option<AuditEntry>, AuditError> {
        Ok(Self::read_entries(path)?.into_iter().next_back())
    }
}
