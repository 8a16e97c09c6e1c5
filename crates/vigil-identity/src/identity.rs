// identity.rs — Agent identity and scope vocabulary.
//
// Identities are ephemeral: issued with a TTL, usable only while
// `now < issued_at + ttl` and not revoked. Expiry is a *derived* predicate
// computed from the issuance time, never a stored flag — this avoids races
// between a background sweep and concurrent reads.
//
// Scopes follow the `<category>:<name>` grammar (e.g., "execute:read_file",
// "api:query"). The wildcard scope "*" grants everything and is reserved
// for trusted operator tooling.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// The wildcard scope — covers any required scope.
pub const WILDCARD_SCOPE: &str = "*";

/// An ephemeral agent identity.
///
/// Created by an explicit provisioning call. Scopes are never added after
/// issuance (re-provision instead); the only mutation is revocation.
/// Lifecycle: created → active → (expired | revoked), terminal states final.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Unique identifier for this identity.
    pub agent_id: Uuid,

    /// Human-readable display name (e.g., "report-summarizer").
    pub name: String,

    /// Permission scopes granted at issuance.
    pub scopes: Vec<String>,

    /// When this identity was issued (UTC).
    pub issued_at: DateTime<Utc>,

    /// Lifetime in seconds from issuance.
    pub ttl_seconds: u64,

    /// Whether this identity has been revoked. One-way: never cleared.
    pub revoked: bool,
}

impl AgentIdentity {
    /// Check whether the TTL has elapsed as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.issued_at + Duration::seconds(self.ttl_seconds as i64)
    }

    /// Check whether the TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// An identity is usable only while unexpired and unrevoked.
    pub fn is_usable(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    /// Check whether this identity's scopes cover a required scope.
    ///
    /// Either an exact match or the wildcard scope satisfies the check.
    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes
            .iter()
            .any(|s| s == WILDCARD_SCOPE || s == required)
    }
}

/// The known scope vocabulary.
///
/// A scope is valid if it is the wildcard, or `<category>:<name>` with a
/// non-empty name and a category drawn from the configured set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeVocabulary {
    /// Known scope categories (e.g., "execute", "api", "retrieve").
    pub categories: BTreeSet<String>,
}

impl Default for ScopeVocabulary {
    fn default() -> Self {
        let categories = ["execute", "api", "retrieve", "message", "admin"]
            .into_iter()
            .map(String::from)
            .collect();
        Self { categories }
    }
}

impl ScopeVocabulary {
    /// Build a vocabulary from explicit category names.
    pub fn new(categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate a single scope string against the vocabulary.
    pub fn validate(&self, scope: &str) -> Result<(), IdentityError> {
        if scope == WILDCARD_SCOPE {
            return Ok(());
        }
        match scope.split_once(':') {
            Some((category, name)) if !name.is_empty() => {
                if self.categories.contains(category) {
                    Ok(())
                } else {
                    Err(IdentityError::InvalidScope {
                        scope: scope.to_string(),
                        reason: format!("unknown category '{}'", category),
                    })
                }
            }
            _ => Err(IdentityError::InvalidScope {
                scope: scope.to_string(),
                reason: "expected '<category>:<name>' or '*'".to_string(),
            }),
        }
    }

    /// Validate every scope in a requested grant set.
    pub fn validate_all(&self, scopes: &[String]) -> Result<(), IdentityError> {
        for scope in scopes {
            self.validate(scope)?;
        }
        Ok(())
    }
}
