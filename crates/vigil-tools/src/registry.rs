// registry.rs — ToolRegistry: the set of explicitly registered tools.
//
// The pipeline implements default-deny at the tool level: an action that
// references a tool absent from this registry is rejected before any
// check stage runs, regardless of the acting identity's scopes.
//
// Each registration is stored as a JSON file `<store_dir>/<tool_name>.json`.
// Registrations are immutable records: re-registration writes a fresh
// record with a new timestamp rather than mutating the old one in place
// (the audit ledger carries the history of both).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A registered tool and the permission scope it requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolRegistration {
    /// Unique tool name (e.g., "read_file").
    pub tool_name: String,
    /// The scope an identity must hold to invoke this tool
    /// (e.g., "execute:read_file").
    pub required_scope: String,
    /// Who registered the tool (operator or provisioning surface).
    pub registered_by: String,
    /// When this registration record was written.
    pub registered_at: DateTime<Utc>,
}

/// Persistent registry of invocable tools.
pub struct ToolRegistry {
    store_dir: PathBuf,
    tools: RwLock<HashMap<String, ToolRegistration>>,
}

impl ToolRegistry {
    /// Open a registry backed by the given directory, loading any
    /// previously registered tools. Creates the directory if needed.
    pub fn open(store_dir: impl AsRef<Path>) -> Result<Self, ToolError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| ToolError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;

        let mut tools = HashMap::new();
        let entries = fs::read_dir(&store_dir).map_err(|source| ToolError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ToolError::Io {
                path: store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| ToolError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                if let Ok(reg) = serde_json::from_str::<ToolRegistration>(&json) {
                    tools.insert(reg.tool_name.clone(), reg);
                }
            }
        }

        Ok(Self {
            store_dir,
            tools: RwLock::new(tools),
        })
    }

    /// Register a new tool. Fails with `DuplicateTool` if the name exists;
    /// use [`ToolRegistry::reregister`] to update an existing tool.
    pub fn register(
        &self,
        tool_name: impl Into<String>,
        required_scope: impl Into<String>,
        registered_by: impl Into<String>,
    ) -> Result<ToolRegistration, ToolError> {
        let tool_name = tool_name.into();
        validate_name(&tool_name)?;

        let mut map = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(&tool_name) {
            return Err(ToolError::DuplicateTool(tool_name));
        }
        let registration = ToolRegistration {
            tool_name: tool_name.clone(),
            required_scope: required_scope.into(),
            registered_by: registered_by.into(),
            registered_at: Utc::now(),
        };
        self.persist(&registration)?;
        map.insert(tool_name, registration.clone());

        tracing::info!(
            tool = %registration.tool_name,
            required_scope = %registration.required_scope,
            "tool registered"
        );
        Ok(registration)
    }

    /// Explicitly update an existing registration.
    ///
    /// Writes a fresh record with a new timestamp. Registering a name that
    /// does not exist yet is also accepted here — the caller has already
    /// opted into the update semantics.
    pub fn reregister(
        &self,
        tool_name: impl Into<String>,
        required_scope: impl Into<String>,
        registered_by: impl Into<String>,
    ) -> Result<ToolRegistration, ToolError> {
        let tool_name = tool_name.into();
        validate_name(&tool_name)?;

        let registration = ToolRegistration {
            tool_name: tool_name.clone(),
            required_scope: required_scope.into(),
            registered_by: registered_by.into(),
            registered_at: Utc::now(),
        };
        self.persist(&registration)?;
        let mut map = self.tools.write().unwrap_or_else(|e| e.into_inner());
        map.insert(tool_name, registration.clone());

        tracing::info!(tool = %registration.tool_name, "tool re-registered");
        Ok(registration)
    }

    /// Look up a tool by name.
    pub fn lookup(&self, tool_name: &str) -> Result<ToolRegistration, ToolError> {
        let map = self.tools.read().unwrap_or_else(|e| e.into_inner());
        map.get(tool_name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))
    }

    /// List all registrations, sorted by name.
    pub fn list(&self) -> Vec<ToolRegistration> {
        let map = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        all
    }

    fn persist(&self, registration: &ToolRegistration) -> Result<(), ToolError> {
        let path = self.store_dir.join(format!("{}.json", registration.tool_name));
        let json = serde_json::to_string_pretty(registration)?;
        fs::write(&path, json).map_err(|source| ToolError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Tool names double as store filenames, so they are restricted to a
/// filesystem-safe identifier alphabet.
fn validate_name(name: &str) -> Result<(), ToolError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if ok {
        Ok(())
    } else {
        Err(ToolError::InvalidName(name.to_string()))
    }
}
