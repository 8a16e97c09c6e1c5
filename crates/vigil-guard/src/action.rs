// action.rs — ActionRecord: the unit of work entering the pipeline.
//
// An ActionRecord is the normalized description of one agent-attempted
// operation, regardless of which framework adapter produced it. It is
// ephemeral — owned by the orchestrator for the duration of a request and
// persisted only if it reaches the circuit breaker (as part of a ticket).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of operation the agent is attempting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A tool invocation (e.g., read_file, send_email).
    ToolCall,
    /// A document retrieval — additionally passes the provenance firewall.
    Retrieval,
    /// An inter-agent message. Routed like a tool call; the messaging
    /// channel is registered as a tool with a `message:*` scope.
    Message,
}

/// One segment of the context window accumulated for the agent.
///
/// Pinned segments carry critical constraints and are never dropped by
/// the context governor, whatever the budget pressure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextSegment {
    pub text: String,
    #[serde(default)]
    pub pinned: bool,
}

impl ContextSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pinned: false,
        }
    }

    pub fn pinned(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pinned: true,
        }
    }
}

/// The normalized record of one agent-attempted action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique per request — generated when the record is built.
    pub action_id: Uuid,

    /// The acting identity.
    pub agent_id: Uuid,

    /// The declared intent this action claims to serve (free text or a
    /// rendered structured goal).
    pub intent: String,

    /// What kind of operation this is.
    pub kind: ActionKind,

    /// The tool (or retrieval/messaging channel) being invoked.
    pub tool_name: String,

    /// Target resource identifier (path, URL, document id, peer agent).
    pub target: String,

    /// Tool-call arguments, as free-form JSON.
    #[serde(default)]
    pub args: serde_json::Value,

    /// For retrievals: the scopes the document's access-control list
    /// requires of the reader.
    #[serde(default)]
    pub document_acl: Vec<String>,

    /// For retrievals: the retrieved content, scanned for embedded
    /// instruction-like patterns before it reaches the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_content: Option<String>,

    /// Context segments accumulated for the agent, governed by the
    /// context budget.
    #[serde(default)]
    pub context: Vec<ContextSegment>,
}

impl ActionRecord {
    /// Build a tool-call action with a fresh action id.
    pub fn new(
        agent_id: Uuid,
        intent: impl Into<String>,
        tool_name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            agent_id,
            intent: intent.into(),
            kind: ActionKind::ToolCall,
            tool_name: tool_name.into(),
            target: target.into(),
            args: serde_json::Value::Null,
            document_acl: Vec::new(),
            retrieved_content: None,
            context: Vec::new(),
        }
    }

    /// Set the action kind and return self (builder pattern).
    pub fn with_kind(mut self, kind: ActionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the tool-call arguments and return self.
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Set the document ACL and return self.
    pub fn with_document_acl(mut self, acl: Vec<String>) -> Self {
        self.document_acl = acl;
        self
    }

    /// Set the retrieved content and return self.
    pub fn with_retrieved_content(mut self, content: impl Into<String>) -> Self {
        self.retrieved_content = Some(content.into());
        self
    }

    /// Set the context segments and return self.
    pub fn with_context(mut self, context: Vec<ContextSegment>) -> Self {
        self.context = context;
        self
    }
}
