//! Runtime-acquired behaviours.
//!
//! A learned skill is declarative: it has a name and a description and,
//! when performed, narrates itself. It lives only in the agent's registry
//! and is gone after a restart.

use async_trait::async_trait;
use mindloop_core::{ActionError, ActionOutcome, ParameterSpec};
use serde_json::json;
use std::sync::Arc;

use crate::action::{Action, ActionContext, ActionParams};
use crate::registry::ActionOrigin;

pub struct LearnedSkill {
    name: String,
    description: String,
}

impl LearnedSkill {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl Action for LearnedSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn category(&self) -> &str {
        "learned"
    }

    async fn execute(&self, ctx: &ActionContext, _params: ActionParams) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome::message(format!(
            "{} performs {}: {}",
            ctx.agent_name, self.name, self.description
        ))
        .with_event(self.name.clone()))
    }
}

pub struct LearnSkill;

#[async_trait]
impl Action for LearnSkill {
    fn name(&self) -> &str {
        "learn_skill"
    }

    fn description(&self) -> &str {
        "Learn a new behaviour, usually a simple action, that you can perform later."
    }

    fn category(&self) -> &str {
        "learning"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("skill_name", "name of the skill"),
            ParameterSpec::new("skill_description", "what the skill does"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let name = params.require(self.name(), "skill_name")?;
        let description = params.require(self.name(), "skill_description")?;

        if ctx.registry.origin(&name) == Some(ActionOrigin::Innate) {
            return Err(ActionError::invalid(
                self.name(),
                format!("'{name}' is an innate action"),
            ));
        }

        ctx.registry.register(
            Arc::new(LearnedSkill::new(name.clone(), description.clone())),
            ActionOrigin::Learned,
        );
        tracing::info!(user_id = %ctx.user_id, skill = %name, "Learned new skill");

        Ok(
            ActionOutcome::message(format!("{} learned a new skill: {name}!", ctx.agent_name))
                .with_event("learn_skill")
                .with_data(json!({"skill_name": name, "skill_description": description})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_registry;
    use crate::testing::context_with;

    #[tokio::test]
    async fn learned_skill_is_callable() {
        let ctx = context_with(default_registry());
        let before = ctx.registry.len();
        let outcome = LearnSkill
            .execute(
                &ctx,
                json!({"skill_name": "wave", "skill_description": "Waves hello"}).into(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Alice learned a new skill: wave!"));
        assert_eq!(ctx.registry.len(), before + 1);
        assert_eq!(ctx.registry.origin("wave"), Some(ActionOrigin::Learned));

        let outcome = ctx
            .registry
            .execute("wave", &ctx, ActionParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Alice performs wave: Waves hello"));
    }

    #[tokio::test]
    async fn innate_actions_cannot_be_shadowed() {
        let ctx = context_with(default_registry());
        let err = LearnSkill
            .execute(
                &ctx,
                json!({"skill_name": "Speak", "skill_description": "nope"}).into(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments { .. }));
        assert_eq!(ctx.registry.origin("speak"), Some(ActionOrigin::Innate));
    }

    #[tokio::test]
    async fn relearning_replaces_description() {
        let ctx = context_with(default_registry());
        for desc in ["first", "second"] {
            LearnSkill
                .execute(&ctx, json!({"skill_name": "hum", "skill_description": desc}).into())
                .await
                .unwrap();
        }
        let schema = ctx.registry.schemas().into_iter().find(|s| s.name == "hum").unwrap();
        assert_eq!(schema.description, "second");
        assert_eq!(schema.category, "learned");
    }
}
