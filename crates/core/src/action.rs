//! Action data types — what a capability declares, returns, and how a
//! decided queue item is tracked.
//!
//! The capability trait itself lives in `mindloop-actions`, next to the
//! registry and executor that drive it.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryRecord;
use crate::persona::{Dimensions, Intent};
use crate::social::SocialState;

/// One named parameter of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Introspectable description of an action, rendered into the reasoning prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default = "default_category")]
    pub category: String,
    /// "innate" or "learned"; filled in by the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

fn default_category() -> String {
    "general".into()
}

impl ActionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            category: category.into(),
            origin: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.parameters.push(ParameterSpec::new(name, description));
        self
    }

    /// `name(p1, p2): description`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        format!("{}({}): {}", self.name, params.join(", "), self.description)
    }
}

/// State mutations requested by an action. Applied by the Act stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Dimensions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desires: Option<Dimensions>,

    /// Records to add to the tick's retrieved memories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub working_memory_append: Vec<MemoryRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_state: Option<SocialState>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self.intent.is_none()
            && self.emotions.is_none()
            && self.desires.is_none()
            && self.working_memory_append.is_empty()
            && self.social_state.is_none()
    }
}

/// The result of one action execution.
///
/// Every field is optional; an outcome carrying `error` counts as a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_update: Option<StateUpdate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_state_update(mut self, update: StateUpdate) -> Self {
        if !update.is_empty() {
            self.state_update = Some(update);
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
}

/// A decided action, tracked through execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionQueueItem {
    pub name: String,

    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub status: ActionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionOutcome>,
}

impl ActionQueueItem {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        let parameters = match parameters {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            parameters,
            status: ActionStatus::Pending,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_signature() {
        let schema = ActionSchema::new("recall", "Search memory", "memory")
            .param("query", "what to look for")
            .param("limit", "how many");
        assert_eq!(schema.signature(), "recall(query, limit): Search memory");
    }

    #[test]
    fn outcome_skips_empty_fields() {
        let outcome = ActionOutcome::message("hi").with_state_update(StateUpdate::default());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, json!({"message": "hi"}));
        assert!(!outcome.is_error());
        assert!(ActionOutcome::error("boom").is_error());
    }

    #[test]
    fn queue_item_from_decision() {
        let item: ActionQueueItem =
            serde_json::from_value(json!({"name": "speak", "parameters": {"content": "hi"}})).unwrap();
        assert_eq!(item.status, ActionStatus::Pending);
        assert_eq!(item.parameters["content"], "hi");

        let item = ActionQueueItem::new("daze", json!(null));
        assert!(item.parameters.is_empty());
        assert_eq!(serde_json::to_value(item.status).unwrap(), "pending");
    }
}
