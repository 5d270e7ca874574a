//! One user's cognitive cycle and the per-tick state it threads through
//! Observe, Think and Act.

use mindloop_actions::{ActionContext, ActionExecutor, ActionRegistry};
use mindloop_core::{
    ActionOutcome, ActionQueueItem, AgentEvent, AgentLog, EventBus, GenerationParams, MemoryRecord,
    MemoryStore, Provider, Result, StateView,
};
use mindloop_memory::{PersonaStore, WorkingMemory};
use std::sync::Arc;
use tracing::debug;

use crate::recorder::Recorder;

/// Scratch record for one tick. Dropped once Act finishes.
#[derive(Debug, Clone, Default)]
pub struct CycleState {
    pub input: Option<String>,
    /// Records retrieved this tick, by Observe lookups or by actions.
    pub memories: Vec<MemoryRecord>,
    pub latest_perception: String,
    /// The parsed reasoning output, as the model wrote it.
    pub decision: serde_json::Value,
    pub action_queue: Vec<ActionQueueItem>,
    pub results: Vec<ActionOutcome>,
}

impl CycleState {
    pub fn new(input: Option<String>) -> Self {
        Self {
            input,
            decision: serde_json::Value::Object(Default::default()),
            ..Default::default()
        }
    }

    pub fn spoke(&self) -> bool {
        self.action_queue.iter().any(|item| item.name == "speak")
    }
}

/// Model and sampling settings for one of the two LLM calls.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub params: GenerationParams,
}

/// Who the agent is talking to.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub name: String,
    pub profile: String,
}

/// Everything one user's cycle reads and writes.
pub struct Cycle {
    pub user_id: String,
    pub agent_name: String,
    pub user: UserProfile,
    pub continuous_thinking: bool,

    pub working_memory: Arc<WorkingMemory>,
    pub persona: Arc<PersonaStore>,
    pub memory: Arc<dyn MemoryStore>,
    pub registry: Arc<ActionRegistry>,
    pub executor: ActionExecutor,

    pub llm: Arc<dyn Provider>,
    pub think_model: ModelSettings,
    pub perception_llm: Arc<dyn Provider>,
    pub perception_model: ModelSettings,

    pub recorder: Recorder,
    pub bus: EventBus,
}

impl Cycle {
    pub fn action_context(&self) -> ActionContext {
        ActionContext {
            user_id: self.user_id.clone(),
            agent_name: self.agent_name.clone(),
            persona: self.persona.clone(),
            working_memory: self.working_memory.clone(),
            memory: self.memory.clone(),
            registry: self.registry.clone(),
        }
    }

    /// The persona prompt with the current user's line.
    pub fn persona_prompt(&self) -> String {
        let user = (!self.user.profile.is_empty())
            .then_some((self.user.name.as_str(), self.user.profile.as_str()));
        self.persona.profile().persona_prompt(user)
    }

    /// Run Observe → Think → Act once.
    pub async fn tick(&self, input: Option<String>) -> Result<CycleState> {
        self.bus.publish(AgentEvent::log(AgentLog::CycleStart {
            input: input.clone(),
        }));
        let mut state = CycleState::new(input);

        self.observe(&mut state).await?;
        self.bus.publish(AgentEvent::State {
            data: StateView {
                instant_memory: Some(self.working_memory.instant_memories()),
                ..Default::default()
            },
        });

        self.think(&mut state).await?;
        self.bus.publish(AgentEvent::log(AgentLog::Thought {
            content: state.decision.clone(),
        }));

        self.act(&mut state).await;
        let summary = if state.spoke() {
            "Spoke via action."
        } else {
            "Decided to stay silent."
        };
        self.bus.publish(AgentEvent::log(AgentLog::Action {
            content: summary.into(),
        }));

        debug!(
            user_id = %self.user_id,
            actions = state.action_queue.len(),
            memories = state.memories.len(),
            "Tick complete"
        );
        Ok(state)
    }
}

impl std::fmt::Debug for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cycle")
            .field("user_id", &self.user_id)
            .field("agent_name", &self.agent_name)
            .field("think_model", &self.think_model.model)
            .field("perception_model", &self.perception_model.model)
            .finish()
    }
}
