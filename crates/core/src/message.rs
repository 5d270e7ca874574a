//! Message types: chat messages sent to the text-generation backend, and the
//! history entries kept in an agent's working memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a chat message sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The agent itself
    Assistant,
    /// Instructions (persona, guidance, output format)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single chat message in a provider request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// One entry of a working-memory history.
///
/// Chat entries use the roles `user`, `assistant` and `system`. Internal
/// events (`action`, `action_error`, `thinking_process`, ...) store their
/// type as the role so the record stays flat on disk and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,

    pub content: String,

    /// Display name of the speaker, used instead of the role when rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Event type for non-chat entries.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Payload attached to an event (usually an action outcome).
    #[serde(default, rename = "actionData", skip_serializing_if = "Option::is_none")]
    pub action_data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Roles rendered into language-model context.
pub const CHAT_ROLES: [&str; 3] = ["user", "assistant", "system"];

impl HistoryEntry {
    pub fn chat(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
            name: None,
            kind: None,
            action_data: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn event(
        kind: impl Into<String>,
        content: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let kind = kind.into();
        Self {
            role: kind.clone(),
            content: content.into(),
            name: None,
            kind: Some(kind),
            action_data: data,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.action_data = Some(data);
        self
    }

    /// Whether this entry belongs in language-model context.
    pub fn is_chat(&self) -> bool {
        CHAT_ROLES.contains(&self.role.as_str())
    }

    /// The label used when rendering this entry as `speaker: content`.
    pub fn speaker(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn event_entries_are_not_chat() {
        let entry = HistoryEntry::event("action", "Alice is zoning out", None);
        assert_eq!(entry.role, "action");
        assert_eq!(entry.kind.as_deref(), Some("action"));
        assert!(!entry.is_chat());
        assert!(HistoryEntry::chat(Role::System, "note").is_chat());
    }

    #[test]
    fn history_entry_wire_names() {
        let entry = HistoryEntry::event("action", "done", Some(serde_json::json!({"ok": true})));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "action");
        assert_eq!(json["actionData"]["ok"], true);
        assert!(json.get("name").is_none());
    }

    #[test]
    fn speaker_prefers_name() {
        let entry = HistoryEntry::chat(Role::User, "hi").with_name("Bob");
        assert_eq!(entry.speaker(), "Bob");
        assert_eq!(HistoryEntry::chat(Role::User, "hi").speaker(), "user");
    }

    #[test]
    fn legacy_entry_without_timestamp_parses() {
        let entry: HistoryEntry =
            serde_json::from_str(r#"{"role":"User","content":"hello"}"#).unwrap();
        assert_eq!(entry.role, "User");
        assert!(entry.timestamp.is_none());
    }
}
