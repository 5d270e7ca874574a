//! # mindloop core
//!
//! Domain types, collaborator contracts, and error definitions for the
//! mindloop agent runtime. Nothing in here does I/O: the crate describes the
//! data that flows through one agent's Observe → Think → Act cycle and the
//! traits the runtime consumes (text generation, long-term memory).
//!
//! Implementations live in their own crates and depend inward on this one.

pub mod action;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod persona;
pub mod provider;
pub mod social;

// Re-export key types at crate root for ergonomics
pub use action::{
    ActionOutcome, ActionQueueItem, ActionSchema, ActionStatus, ParameterSpec, StateUpdate,
};
pub use error::{ActionError, Error, MemoryError, PersistenceError, ProviderError, Result};
pub use event::{AgentEvent, AgentLog, EventBus, StateView};
pub use memory::{MemoryKind, MemoryPatch, MemoryRecord, MemoryStore, NewMemory};
pub use message::{HistoryEntry, Message, Role};
pub use persona::{
    ChainStatus, Dimensions, Intent, IntentUpdate, PersonaProfile, PersonaSnapshot, PersonaUpdate,
    PoolLimits, ThinkingChain, ThinkingPoolActions,
};
pub use provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse, ResponseFormat};
pub use social::SocialState;
