//! Memory store trait — the long-term (vector) memory contract.
//!
//! The agent stores episodic experiences, cognitive beliefs and its social
//! state per user, and retrieves them by free-text query. Which engine does
//! the ranking (a vector database, keyword scoring) is an implementation
//! detail behind this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::social::SocialState;

/// What a record remembers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// "What I went through"
    Episodic,
    /// "What I know or believe"
    Cognitive,
    /// Snapshot of the relationship with a user
    SocialState,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic",
            MemoryKind::Cognitive => "cognitive",
            MemoryKind::SocialState => "social_state",
        }
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(MemoryKind::Episodic),
            "cognitive" => Ok(MemoryKind::Cognitive),
            "social_state" => Ok(MemoryKind::SocialState),
            other => Err(MemoryError::QueryFailed(format!("unknown memory type '{other}'"))),
        }
    }
}

/// A stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,

    pub content: String,

    #[serde(rename = "type")]
    pub kind: MemoryKind,

    pub user_id: String,

    pub timestamp: DateTime<Utc>,

    pub importance: f32,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Structured payload (the social state lives here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,

    /// Relevance score (set by search operations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A memory to be stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub user_id: String,
    pub kind: MemoryKind,
    #[serde(default = "default_importance")]
    pub importance: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

fn default_importance() -> f32 {
    0.5
}

impl NewMemory {
    pub fn new(content: impl Into<String>, user_id: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            content: content.into(),
            user_id: user_id.into(),
            kind,
            importance: default_importance(),
            tags: Vec::new(),
            attributes: None,
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Materialise into a record with a fresh id and timestamp.
    pub fn into_record(self) -> MemoryRecord {
        MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            content: self.content,
            kind: self.kind,
            user_id: self.user_id,
            timestamp: Utc::now(),
            importance: self.importance,
            tags: self.tags,
            attributes: self.attributes,
            score: None,
        }
    }
}

/// Partial update of a stored record (host API edits).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<MemoryKind>,
    #[serde(default)]
    pub importance: Option<f32>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.kind.is_none() && self.importance.is_none()
    }

    pub fn apply(&self, record: &mut MemoryRecord) {
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(importance) = self.importance {
            record.importance = importance;
        }
    }
}

/// The core memory store trait.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Search a user's memories. An empty query returns the newest records.
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Store a memory, returning its id.
    async fn add(&self, memory: NewMemory) -> Result<String, MemoryError>;

    /// Get a memory by id.
    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError>;

    /// Apply a partial update. Returns false when the id is unknown.
    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<bool, MemoryError>;

    /// Delete a memory by id. Returns false when the id is unknown.
    async fn delete(&self, id: &str) -> Result<bool, MemoryError>;

    /// Newest records of a user, optionally filtered by kind.
    async fn list(
        &self,
        user_id: &str,
        limit: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.search("", user_id, limit, kind).await
    }

    /// The newest social-state snapshot for a user, or the default one.
    async fn social_state(&self, user_id: &str) -> Result<SocialState, MemoryError> {
        let latest = self
            .search("", user_id, 1, Some(MemoryKind::SocialState))
            .await?;
        let state = latest
            .into_iter()
            .next()
            .and_then(|r| r.attributes)
            .and_then(|attrs| serde_json::from_value::<SocialState>(attrs).ok())
            .unwrap_or_default();
        Ok(state)
    }

    /// Record a new social-state snapshot.
    async fn update_social_state(
        &self,
        user_id: &str,
        state: &SocialState,
    ) -> Result<(), MemoryError> {
        let attributes =
            serde_json::to_value(state).map_err(|e| MemoryError::Serialization(e.to_string()))?;
        self.add(
            NewMemory::new(
                format!("Social state update: {}", state.stage),
                user_id,
                MemoryKind::SocialState,
            )
            .with_importance(1.0)
            .with_attributes(attributes),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&MemoryKind::SocialState).unwrap(),
            "\"social_state\""
        );
        assert_eq!("cognitive".parse::<MemoryKind>().unwrap(), MemoryKind::Cognitive);
        assert!("dream".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn new_memory_builder() {
        let record = NewMemory::new("saw a cat", "u1", MemoryKind::Episodic)
            .with_tags(vec!["cat".into()])
            .into_record();
        assert!(!record.id.is_empty());
        assert!((record.importance - 0.5).abs() < f32::EPSILON);
        assert_eq!(record.tags, vec!["cat".to_string()]);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut record = NewMemory::new("old", "u1", MemoryKind::Episodic).into_record();
        let patch = MemoryPatch {
            importance: Some(0.9),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut record);
        assert_eq!(record.content, "old");
        assert!((record.importance - 0.9).abs() < f32::EPSILON);
        assert!(MemoryPatch::default().is_empty());
    }

    #[test]
    fn record_uses_type_on_the_wire() {
        let record = NewMemory::new("x", "u1", MemoryKind::Cognitive).into_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "cognitive");
        assert!(json.get("score").is_none());
    }
}
