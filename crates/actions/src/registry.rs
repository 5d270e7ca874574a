//! Per-agent action registry.
//!
//! Innate actions are registered at startup; learned ones are added at
//! runtime by `learn_skill`, so the map sits behind a lock and lookups hand
//! out `Arc`s that outlive the guard.

use mindloop_core::{ActionError, ActionOutcome, ActionSchema};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::action::{Action, ActionContext, ActionParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOrigin {
    Innate,
    Learned,
}

impl ActionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Innate => "innate",
            Self::Learned => "learned",
        }
    }
}

struct Entry {
    action: Arc<dyn Action>,
    origin: ActionOrigin,
}

pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Entry>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.actions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.actions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an action. Replaces any action whose name matches
    /// case-insensitively.
    pub fn register(&self, action: Arc<dyn Action>, origin: ActionOrigin) {
        let name = action.name().to_string();
        let mut actions = self.write();
        actions.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        tracing::debug!(action = %name, origin = origin.as_str(), "Registered action");
        actions.insert(name, Entry { action, origin });
    }

    /// Look up by exact name, then case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        let actions = self.read();
        actions
            .get(name)
            .or_else(|| {
                actions
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, entry)| entry)
            })
            .map(|entry| entry.action.clone())
    }

    pub fn origin(&self, name: &str) -> Option<ActionOrigin> {
        let actions = self.read();
        actions
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, entry)| entry.origin)
    }

    /// Schemas of every registered action, sorted by name.
    pub fn schemas(&self) -> Vec<ActionSchema> {
        let mut schemas: Vec<ActionSchema> = self
            .read()
            .values()
            .map(|entry| {
                let mut schema = entry.action.schema();
                schema.origin = Some(entry.origin.as_str().to_string());
                schema
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run an action by name.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &ActionContext,
        params: ActionParams,
    ) -> Result<ActionOutcome, ActionError> {
        let action = self
            .get(name)
            .ok_or_else(|| ActionError::NotFound(name.to_string()))?;
        action.execute(ctx, params).await
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Action for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "Echoes its text"
        }
        async fn execute(&self, _ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
            Ok(ActionOutcome::message(params.str_or("text", "")))
        }
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(Echo("echo")), ActionOrigin::Innate);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("ECHO").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn reregistering_replaces_case_insensitive_duplicates() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(Echo("Wave")), ActionOrigin::Innate);
        registry.register(Arc::new(Echo("wave")), ActionOrigin::Learned);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.origin("WAVE"), Some(ActionOrigin::Learned));
    }

    #[test]
    fn schemas_carry_origin_and_sort() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(Echo("zeta")), ActionOrigin::Learned);
        registry.register(Arc::new(Echo("alpha")), ActionOrigin::Innate);
        let schemas = registry.schemas();
        assert_eq!(schemas[0].name, "alpha");
        assert_eq!(schemas[0].origin.as_deref(), Some("innate"));
        assert_eq!(schemas[1].origin.as_deref(), Some("learned"));
        assert_eq!(schemas[0].category, "general");
    }

    #[tokio::test]
    async fn execute_by_name() {
        let ctx = context();
        ctx.registry.register(Arc::new(Echo("echo")), ActionOrigin::Innate);
        let outcome = ctx
            .registry
            .execute("echo", &ctx, json!({"text": "hello world"}).into())
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("hello world"));

        let err = ctx
            .registry
            .execute("nonexistent", &ctx, ActionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }
}
