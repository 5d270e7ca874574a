//! Actions give the agent its behaviour.
//!
//! An action is a named capability the reasoning step can put in its
//! queue: speak, recall a memory, advance a line of thought, learn a new
//! skill. This crate holds the contract, the per-agent registry, the
//! sequential executor and the innate repertoire.

pub mod action;
pub mod builtin;
pub mod executor;
pub mod registry;

pub use action::{Action, ActionContext, ActionParams};
pub use builtin::LearnedSkill;
pub use executor::{ActionExecutor, ExecutionHooks, NoHooks};
pub use registry::{ActionOrigin, ActionRegistry};

use std::sync::Arc;

/// Create a registry holding every innate action.
pub fn default_registry() -> Arc<ActionRegistry> {
    let registry = ActionRegistry::new();
    for action in builtin::innate_actions() {
        registry.register(action, ActionOrigin::Innate);
    }
    Arc::new(registry)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::{ActionContext, ActionRegistry};
    use mindloop_core::persona::PoolLimits;
    use mindloop_core::PersonaProfile;
    use mindloop_memory::{InMemoryStore, PersonaStore, WorkingMemory, WorkingMemoryConfig};
    use std::sync::Arc;

    pub fn context_with(registry: Arc<ActionRegistry>) -> ActionContext {
        ActionContext {
            user_id: "u1".into(),
            agent_name: "Alice".into(),
            persona: Arc::new(PersonaStore::ephemeral(
                "u1",
                PersonaProfile::named("Alice"),
                PoolLimits::default(),
            )),
            working_memory: Arc::new(WorkingMemory::ephemeral("u1", WorkingMemoryConfig::default())),
            memory: Arc::new(InMemoryStore::new()),
            registry,
        }
    }

    pub fn context() -> ActionContext {
        context_with(Arc::new(ActionRegistry::new()))
    }
}
