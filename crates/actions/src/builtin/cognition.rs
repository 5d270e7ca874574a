//! Thinking-pool actions. All pool changes go through the persona store so
//! the id and cap rules stay in one place.

use async_trait::async_trait;
use mindloop_core::persona::{CompleteChain, ContinueChain, NewChain, default_topic};
use mindloop_core::{
    ActionError, ActionOutcome, IntentUpdate, MemoryKind, NewMemory, ParameterSpec, PersonaUpdate,
    StateUpdate, ThinkingPoolActions,
};
use serde_json::json;
use tracing::warn;

use crate::action::{Action, ActionContext, ActionParams};

fn pool_update(actions: ThinkingPoolActions) -> PersonaUpdate {
    PersonaUpdate::intent(IntentUpdate {
        thinking_pool_actions: Some(actions),
        ..Default::default()
    })
}

/// The full post-change intent, so the Act stage can broadcast it.
fn intent_update(ctx: &ActionContext) -> StateUpdate {
    StateUpdate {
        intent: Some(ctx.persona.get_state().intent),
        ..Default::default()
    }
}

pub struct ThinkAdd;

#[async_trait]
impl Action for ThinkAdd {
    fn name(&self) -> &str {
        "think_add"
    }

    fn description(&self) -> &str {
        "Start a new chain of thought for a separate question you want to keep thinking about."
    }

    fn category(&self) -> &str {
        "cognition"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("topic", "what the chain is about"),
            ParameterSpec::new("content", "the first thought"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let topic = params.str("topic").unwrap_or_else(default_topic);
        let content = params.str_or("content", "...");

        let added = ctx.persona.update_state(&pool_update(ThinkingPoolActions {
            add: vec![NewChain {
                topic: topic.clone(),
                content: content.clone(),
            }],
            ..Default::default()
        }));
        let chain_id = added
            .into_iter()
            .next()
            .ok_or_else(|| ActionError::failed(self.name(), "thinking pool is full"))?;

        Ok(
            ActionOutcome::message(format!("{} started thinking about: {topic}", ctx.agent_name))
                .with_event("think_add")
                .with_data(json!({"chain_id": chain_id, "topic": topic, "content": content}))
                .with_state_update(intent_update(ctx)),
        )
    }
}

pub struct ThinkUpdate;

#[async_trait]
impl Action for ThinkUpdate {
    fn name(&self) -> &str {
        "think_update"
    }

    fn description(&self) -> &str {
        "Advance an existing chain of thought when you have a new idea about it."
    }

    fn category(&self) -> &str {
        "cognition"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("chain_id", "id of the chain"),
            ParameterSpec::new("content", "the new step"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let chain_id = params.require(self.name(), "chain_id")?;
        let content = params.str_or("content", "...");

        // Unknown ids are ignored by the store.
        ctx.persona.update_state(&pool_update(ThinkingPoolActions {
            r#continue: vec![ContinueChain {
                id: chain_id.clone(),
                content: content.clone(),
            }],
            ..Default::default()
        }));

        Ok(
            ActionOutcome::message(format!("{} advanced a thought (ID: {chain_id})", ctx.agent_name))
                .with_event("think_update")
                .with_data(json!({"chain_id": chain_id, "content": content}))
                .with_state_update(intent_update(ctx)),
        )
    }
}

/// Close a chain and archive the whole chain as a cognitive memory.
pub struct ThinkComplete;

#[async_trait]
impl Action for ThinkComplete {
    fn name(&self) -> &str {
        "think_complete"
    }

    fn description(&self) -> &str {
        "Finish a chain of thought once the question is settled."
    }

    fn category(&self) -> &str {
        "cognition"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("chain_id", "id of the chain"),
            ParameterSpec::new("content", "the conclusion"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let chain_id = params.require(self.name(), "chain_id")?;
        let conclusion = params
            .str("content")
            .or_else(|| params.str("conclusion"))
            .unwrap_or_else(|| "Done".into());

        ctx.persona.update_state(&pool_update(ThinkingPoolActions {
            complete: vec![CompleteChain {
                id: chain_id.clone(),
                conclusion: Some(conclusion.clone()),
            }],
            ..Default::default()
        }));

        let mut archived = "";
        let state = ctx.persona.get_state();
        if let Some(chain) = state.intent.chain(&chain_id) {
            let text = format!(
                "[Thought summary] Topic: {}\n{}",
                chain.topic,
                chain.content.join("\n")
            );
            let memory = NewMemory::new(text, &ctx.user_id, MemoryKind::Cognitive)
                .with_tags(vec!["thought_chain".into(), "conclusion".into()]);
            match ctx.memory.add(memory).await {
                Ok(_) => archived = " (archived to memory)",
                Err(e) => warn!(chain_id = %chain_id, error = %e, "Failed to archive thought chain"),
            }
        }

        Ok(ActionOutcome::message(format!(
            "{} finished a thought (ID: {chain_id}){archived}",
            ctx.agent_name
        ))
        .with_event("think_complete")
        .with_data(json!({"chain_id": chain_id, "content": conclusion}))
        .with_state_update(StateUpdate {
            intent: Some(state.intent),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;
    use mindloop_core::ChainStatus;

    #[tokio::test]
    async fn add_update_complete_lifecycle() {
        let ctx = context();

        let outcome = ThinkAdd
            .execute(&ctx, json!({"topic": "Bob's hobby", "content": "He mentioned jazz"}).into())
            .await
            .unwrap();
        let chain_id = outcome.data.unwrap()["chain_id"].as_str().unwrap().to_string();
        assert_eq!(chain_id.len(), 8);
        let intent = outcome.state_update.unwrap().intent.unwrap();
        assert!(intent.chain(&chain_id).unwrap().is_active());

        ThinkUpdate
            .execute(&ctx, json!({"chain_id": chain_id, "content": "Maybe he plays"}).into())
            .await
            .unwrap();

        let outcome = ThinkComplete
            .execute(&ctx, json!({"chain_id": chain_id, "content": "He plays sax"}).into())
            .await
            .unwrap();
        assert!(outcome.message.unwrap().ends_with("(archived to memory)"));

        let state = ctx.persona.get_state();
        let chain = state.intent.chain(&chain_id).unwrap();
        assert_eq!(chain.status, ChainStatus::Completed);
        assert_eq!(
            chain.content,
            vec!["He mentioned jazz", "Maybe he plays", "[Conclusion] He plays sax"]
        );

        let archived = ctx.memory.list("u1", 10, Some(MemoryKind::Cognitive)).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].content.starts_with("[Thought summary] Topic: Bob's hobby\n"));
        assert!(archived[0].tags.contains(&"thought_chain".to_string()));
    }

    #[tokio::test]
    async fn complete_reads_conclusion_alias() {
        let ctx = context();
        let outcome = ThinkAdd
            .execute(&ctx, json!({"topic": "Bob", "content": "Who is Bob?"}).into())
            .await
            .unwrap();
        let chain_id = outcome.data.unwrap()["chain_id"].as_str().unwrap().to_string();

        ThinkComplete
            .execute(&ctx, json!({"chain_id": chain_id, "conclusion": "A friend"}).into())
            .await
            .unwrap();
        let state = ctx.persona.get_state();
        assert_eq!(
            state.intent.chain(&chain_id).unwrap().content.last().unwrap(),
            "[Conclusion] A friend"
        );
    }

    #[tokio::test]
    async fn defaults_apply() {
        let ctx = context();
        let outcome = ThinkAdd.execute(&ctx, ActionParams::default()).await.unwrap();
        assert_eq!(outcome.data.unwrap()["topic"], "Untitled thought");
    }

    #[tokio::test]
    async fn unknown_chain_is_left_alone() {
        let ctx = context();
        let before = ctx.persona.get_state();
        ThinkUpdate
            .execute(&ctx, json!({"chain_id": "nope", "content": "x"}).into())
            .await
            .unwrap();
        let outcome = ThinkComplete
            .execute(&ctx, json!({"chain_id": "nope"}).into())
            .await
            .unwrap();
        assert_eq!(ctx.persona.get_state(), before);
        assert!(!outcome.message.unwrap().contains("archived"));
        assert!(ctx.memory.list("u1", 10, None).await.unwrap().is_empty());
    }
}
