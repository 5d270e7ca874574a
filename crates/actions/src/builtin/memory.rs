//! Long-term memory actions: targeted recall, loose association, and
//! writing experiences or beliefs.

use async_trait::async_trait;
use mindloop_core::{
    ActionError, ActionOutcome, MemoryError, MemoryKind, MemoryRecord, NewMemory, ParameterSpec,
    StateUpdate,
};
use serde_json::json;

use crate::action::{Action, ActionContext, ActionParams};

const RECALL_LIMIT: i64 = 3;
const ASSOCIATE_LIMIT: usize = 5;
const BELIEF_IMPORTANCE: f32 = 0.8;

fn store_failed(action: &str, e: MemoryError) -> ActionError {
    ActionError::failed(action, e.to_string())
}

/// Retrieved records go both to the caller and into the tick's working set.
fn retrieved(message: String, event: &str, records: Vec<MemoryRecord>) -> ActionOutcome {
    ActionOutcome::message(message)
        .with_event(event)
        .with_data(json!(records))
        .with_state_update(StateUpdate {
            working_memory_append: records,
            ..Default::default()
        })
}

pub struct Recall;

#[async_trait]
impl Action for Recall {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Search memory for something specific. Use it when you need precise information."
    }

    fn category(&self) -> &str {
        "memory"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("query", "what to search for"),
            ParameterSpec::new("limit", "maximum number of memories (default 3)"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let query = params.require(self.name(), "query")?;
        let limit = params.int("limit").unwrap_or(RECALL_LIMIT).clamp(1, 50) as usize;
        let records = ctx
            .memory
            .search(&query, &ctx.user_id, limit, None)
            .await
            .map_err(|e| store_failed(self.name(), e))?;
        Ok(retrieved(
            format!("{} is recalling '{query}'...", ctx.agent_name),
            "recall",
            records,
        ))
    }
}

pub struct Associate;

#[async_trait]
impl Action for Associate {
    fn name(&self) -> &str {
        "associate"
    }

    fn description(&self) -> &str {
        "Let a concept spark loosely related memories. Use it to look for inspiration."
    }

    fn category(&self) -> &str {
        "memory"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("concept", "the concept to associate from")]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let concept = params.require(self.name(), "concept")?;
        let records = ctx
            .memory
            .search(&concept, &ctx.user_id, ASSOCIATE_LIMIT, None)
            .await
            .map_err(|e| store_failed(self.name(), e))?;
        Ok(retrieved(
            format!("{} lets '{concept}' spark associations...", ctx.agent_name),
            "associate",
            records,
        ))
    }
}

/// Store an experience as an episodic memory.
pub struct Memorize;

#[async_trait]
impl Action for Memorize {
    fn name(&self) -> &str {
        "memorize"
    }

    fn description(&self) -> &str {
        "Store something that happened (an event, a conversation, an experience) as an episodic memory."
    }

    fn category(&self) -> &str {
        "memory"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("content", "what to remember"),
            ParameterSpec::new("tags", "comma-separated tags"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let content = params.require(self.name(), "content")?;
        let memory = NewMemory::new(content.clone(), &ctx.user_id, MemoryKind::Episodic)
            .with_tags(params.list("tags"));
        ctx.memory
            .add(memory)
            .await
            .map_err(|e| store_failed(self.name(), e))?;
        Ok(
            ActionOutcome::message(format!("{} etched this experience into memory...", ctx.agent_name))
                .with_event("memorize")
                .with_data(json!(content)),
        )
    }
}

/// Store knowledge or an opinion as a cognitive memory.
pub struct AddBelief;

#[async_trait]
impl Action for AddBelief {
    fn name(&self) -> &str {
        "add_belief"
    }

    fn description(&self) -> &str {
        "Store something you learned (knowledge, an opinion, a fact) as a cognitive memory."
    }

    fn category(&self) -> &str {
        "memory"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("content", "the belief"),
            ParameterSpec::new("tags", "comma-separated tags"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let content = params.require(self.name(), "content")?;
        let memory = NewMemory::new(content.clone(), &ctx.user_id, MemoryKind::Cognitive)
            .with_importance(BELIEF_IMPORTANCE)
            .with_tags(params.list("tags"));
        ctx.memory
            .add(memory)
            .await
            .map_err(|e| store_failed(self.name(), e))?;
        Ok(
            ActionOutcome::message(format!("{} formed a new belief...", ctx.agent_name))
                .with_event("new_belief")
                .with_data(json!(content)),
        )
    }
}
