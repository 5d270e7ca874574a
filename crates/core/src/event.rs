//! Agent events — the stream a runtime publishes to its host.
//!
//! Events are published while a tick runs (responses, state snapshots,
//! action-queue progress, structured logs). The transport layer subscribes
//! and forwards them to a client without the cycle knowing who listens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::action::{ActionOutcome, ActionQueueItem};
use crate::message::HistoryEntry;
use crate::persona::{Dimensions, Intent, PersonaSnapshot};

/// Every event a runtime emits. The `type` tag matches the client protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    #[serde(rename = "agent_response_start")]
    ResponseStart,

    #[serde(rename = "agent_stream")]
    ResponseChunk { chunk: String },

    #[serde(rename = "agent_response_end")]
    ResponseEnd,

    /// Full or partial persona snapshot.
    #[serde(rename = "agent_state")]
    State { data: StateView },

    ActionQueueUpdate { data: Vec<ActionQueueItem> },

    #[serde(rename = "agent_action")]
    Action { data: ActionOutcome },

    #[serde(rename = "agent_log")]
    Log { log: AgentLog },

    HistoryUpdate { history: Vec<HistoryEntry> },

    Error { message: String },
}

impl AgentEvent {
    pub fn state(snapshot: &PersonaSnapshot) -> Self {
        AgentEvent::State {
            data: StateView::from(snapshot),
        }
    }

    pub fn log(log: AgentLog) -> Self {
        AgentEvent::Log { log }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::ResponseStart => "agent_response_start",
            AgentEvent::ResponseChunk { .. } => "agent_stream",
            AgentEvent::ResponseEnd => "agent_response_end",
            AgentEvent::State { .. } => "agent_state",
            AgentEvent::ActionQueueUpdate { .. } => "action_queue_update",
            AgentEvent::Action { .. } => "agent_action",
            AgentEvent::Log { .. } => "agent_log",
            AgentEvent::HistoryUpdate { .. } => "history_update",
            AgentEvent::Error { .. } => "error",
        }
    }
}

/// Client-facing persona view. Intent is exposed as `goals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Dimensions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desires: Option<Dimensions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Intent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instant_memory: Option<Vec<String>>,
}

impl From<&PersonaSnapshot> for StateView {
    fn from(snapshot: &PersonaSnapshot) -> Self {
        Self {
            emotions: Some(snapshot.emotions.clone()),
            desires: Some(snapshot.desires.clone()),
            goals: Some(snapshot.intent.clone()),
            instant_memory: None,
        }
    }
}

/// Structured per-tick log entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentLog {
    CycleStart { input: Option<String> },
    Thought { content: serde_json::Value },
    Action { content: String },
    Error { content: String },
}

/// A broadcast-based bus for one runtime's events.
///
/// Cloning shares the underlying channel. Publishing with no subscribers is
/// not an error.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AgentEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
