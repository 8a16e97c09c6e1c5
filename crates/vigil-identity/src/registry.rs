// registry.rs — IdentityRegistry: provisioning, resolution, revocation.
//
// Each identity is stored as a JSON file: `<store_dir>/<agent_id>.json`.
// This keeps identities isolated and easy to inspect manually. The
// registry keeps an in-memory map guarded by an RwLock so it can serve
// many concurrent pipeline requests behind an Arc, and reloads the map
// from disk on open so identities survive process restarts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::error::IdentityError;
use crate::identity::{AgentIdentity, ScopeVocabulary};

/// Persistent registry of ephemeral agent identities.
pub struct IdentityRegistry {
    store_dir: PathBuf,
    vocabulary: ScopeVocabulary,
    identities: RwLock<HashMap<Uuid, AgentIdentity>>,
}

impl IdentityRegistry {
    /// Open a registry backed by the given directory, loading any
    /// previously provisioned identities. Creates the directory if needed.
    pub fn open(
        store_dir: impl AsRef<Path>,
        vocabulary: ScopeVocabulary,
    ) -> Result<Self, IdentityError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| IdentityError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;

        let mut identities = HashMap::new();
        let entries = fs::read_dir(&store_dir).map_err(|source| IdentityError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| IdentityError::Io {
                path: store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| IdentityError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                if let Ok(identity) = serde_json::from_str::<AgentIdentity>(&json) {
                    identities.insert(identity.agent_id, identity);
                }
            }
        }

        Ok(Self {
            store_dir,
            vocabulary,
            identities: RwLock::new(identities),
        })
    }

    /// Provision a fresh ephemeral identity.
    ///
    /// Fails with `InvalidScope` if any requested scope is outside the
    /// known vocabulary. The identity is persisted before returning.
    pub fn provision(
        &self,
        name: impl Into<String>,
        scopes: Vec<String>,
        ttl_seconds: u64,
    ) -> Result<AgentIdentity, IdentityError> {
        self.vocabulary.validate_all(&scopes)?;

        let identity = AgentIdentity {
            agent_id: Uuid::new_v4(),
            name: name.into(),
            scopes,
            issued_at: Utc::now(),
            ttl_seconds,
            revoked: false,
        };

        self.persist(&identity)?;
        let mut map = self.identities.write().unwrap_or_else(|e| e.into_inner());
        map.insert(identity.agent_id, identity.clone());

        tracing::info!(
            agent_id = %identity.agent_id,
            name = %identity.name,
            ttl_seconds = identity.ttl_seconds,
            "identity provisioned"
        );
        Ok(identity)
    }

    /// Resolve an identity, distinguishing "never existed" from
    /// "was valid but is no longer".
    ///
    /// Expiry is checked lazily here from the issuance time — there is no
    /// stored expired flag to race against concurrent reads.
    pub fn resolve(&self, agent_id: Uuid) -> Result<AgentIdentity, IdentityError> {
        let map = self.identities.read().unwrap_or_else(|e| e.into_inner());
        let identity = map
            .get(&agent_id)
            .ok_or(IdentityError::NotFound(agent_id))?;
        if identity.revoked {
            return Err(IdentityError::Revoked(agent_id));
        }
        if identity.is_expired() {
            return Err(IdentityError::Expired(agent_id));
        }
        Ok(identity.clone())
    }

    /// Revoke an identity. Idempotent: revoking an already-revoked or
    /// nonexistent identity is not an error.
    ///
    /// The revocation is persisted before the in-memory record flips, so
    /// a write failure leaves both sides agreeing the identity is still
    /// live and the caller knows the revocation did not take.
    pub fn revoke(&self, agent_id: Uuid) -> Result<(), IdentityError> {
        let mut map = self.identities.write().unwrap_or_else(|e| e.into_inner());
        let Some(identity) = map.get_mut(&agent_id) else {
            return Ok(());
        };
        if identity.revoked {
            return Ok(());
        }
        let mut snapshot = identity.clone();
        snapshot.revoked = true;
        self.persist(&snapshot)?;
        *identity = snapshot;
        drop(map);

        tracing::warn!(agent_id = %agent_id, "identity revoked");
        Ok(())
    }

    /// List identity ids whose TTL has elapsed.
    ///
    /// Reporting only — expiry stays a derived predicate, so the sweep
    /// never mutates records.
    pub fn sweep_expired(&self) -> Vec<Uuid> {
        let map = self.identities.read().unwrap_or_else(|e| e.into_inner());
        map.values()
            .filter(|i| i.is_expired())
            .map(|i| i.agent_id)
            .collect()
    }

    /// List all identities, newest first.
    pub fn list(&self) -> Vec<AgentIdentity> {
        let map = self.identities.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        all
    }

    /// The scope vocabulary this registry validates against.
    pub fn vocabulary(&self) -> &ScopeVocabulary {
        &self.vocabulary
    }

    fn persist(&self, identity: &AgentIdentity) -> Result<(), IdentityError> {
        let path = self.identity_file(identity.agent_id);
        let json = serde_json::to_string_pretty(identity)?;
        fs::write(&path, json).map_err(|source| IdentityError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn identity_file(&self, agent_id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{}.json", agent_id))
    }
}
