//! The action contract and what an action sees while it runs.

use async_trait::async_trait;
use mindloop_core::{ActionError, ActionOutcome, ActionSchema, MemoryStore, ParameterSpec};
use mindloop_memory::{PersonaStore, WorkingMemory};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::registry::ActionRegistry;

/// A capability the agent can invoke from its action queue.
///
/// Actions never touch the event stream directly. Anything they want the
/// rest of the cycle to see goes into the returned `ActionOutcome`.
#[async_trait]
pub trait Action: Send + Sync {
    /// Unique name used in the action queue (e.g. "speak", "recall").
    fn name(&self) -> &str;

    /// One line shown to the reasoning step.
    fn description(&self) -> &str;

    fn category(&self) -> &str {
        "general"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            category: self.category().to_string(),
            origin: None,
        }
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams)
    -> Result<ActionOutcome, ActionError>;
}

/// Everything one agent's actions may read or mutate.
#[derive(Clone)]
pub struct ActionContext {
    pub user_id: String,
    pub agent_name: String,
    pub persona: Arc<PersonaStore>,
    pub working_memory: Arc<WorkingMemory>,
    pub memory: Arc<dyn MemoryStore>,
    pub registry: Arc<ActionRegistry>,
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("user_id", &self.user_id)
            .field("agent_name", &self.agent_name)
            .field("memory", &self.memory.name())
            .finish()
    }
}

/// Loosely typed parameters as decided by the reasoning step.
///
/// Models are sloppy about types, so numeric getters also accept numeric
/// strings and list getters accept comma-separated text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionParams(Map<String, Value>);

impl ActionParams {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string parameter. Numbers and booleans are stringified.
    pub fn str(&self, key: &str) -> Option<String> {
        let text = match self.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.str(key).unwrap_or_else(|| default.to_string())
    }

    /// Fetch a required string or fail with `InvalidArguments`.
    pub fn require(&self, action: &str, key: &str) -> Result<String, ActionError> {
        self.str(key)
            .ok_or_else(|| ActionError::invalid(action, format!("missing '{key}'")))
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            }
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        let value = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|f| f.is_finite())
    }

    /// A list of strings from an array or comma-separated text.
    pub fn list(&self, key: &str) -> Vec<String> {
        let items: Vec<String> = match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<Map<String, Value>> for ActionParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for ActionParams {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_are_trimmed_and_blank_is_missing() {
        let params = ActionParams::from(json!({"a": "  hi ", "b": "   ", "c": 3, "d": null}));
        assert_eq!(params.str("a").as_deref(), Some("hi"));
        assert_eq!(params.str("b"), None);
        assert_eq!(params.str("c").as_deref(), Some("3"));
        assert_eq!(params.str("d"), None);
        assert_eq!(params.str_or("missing", "idle"), "idle");
        assert!(params.require("speak", "missing").is_err());
    }

    #[test]
    fn numbers_accept_strings() {
        let params = ActionParams::from(json!({"a": "7", "b": 2.6, "c": "-3", "d": "x", "e": "0.25"}));
        assert_eq!(params.int("a"), Some(7));
        assert_eq!(params.int("b"), Some(3));
        assert_eq!(params.int("c"), Some(-3));
        assert_eq!(params.int("d"), None);
        assert_eq!(params.float("e"), Some(0.25));
    }

    #[test]
    fn lists_accept_arrays_and_commas() {
        let params = ActionParams::from(json!({"a": ["x", " y ", ""], "b": "cat, dog,,", "c": 5}));
        assert_eq!(params.list("a"), vec!["x", "y"]);
        assert_eq!(params.list("b"), vec!["cat", "dog"]);
        assert!(params.list("c").is_empty());
    }

    #[test]
    fn non_object_is_empty() {
        assert_eq!(ActionParams::from(json!([1, 2])), ActionParams::default());
    }
}
