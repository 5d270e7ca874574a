//! Per-user agent runtime: owns one cycle and drives it in a background
//! task until stopped.

use std::sync::Arc;
use std::time::Duration;

use mindloop_actions::{ActionExecutor, ActionRegistry, default_registry};
use mindloop_config::AppConfig;
use mindloop_core::persona::PoolLimits;
use mindloop_core::{AgentEvent, AgentLog, EventBus, MemoryStore, PersonaProfile, Provider};
use mindloop_memory::{
    FileStore, InMemoryStore, PersonaStore, StateDir, WorkingMemory, WorkingMemoryConfig,
    load_profile,
};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cycle::{Cycle, ModelSettings, UserProfile};
use crate::recorder::Recorder;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Input queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("Runtime has shut down")]
    Stopped,
}

/// Process-wide collaborators shared by every user's runtime.
#[derive(Clone)]
pub struct AgentServices {
    pub config: Arc<AppConfig>,
    pub llm: Arc<dyn Provider>,
    pub perception_llm: Arc<dyn Provider>,
    pub memory: Arc<dyn MemoryStore>,
    pub profile: PersonaProfile,
    pub recorder: Recorder,
}

impl AgentServices {
    /// Build providers, the long-term memory backend and the persona
    /// template from configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let llm = mindloop_providers::from_config(&config);
        let perception_llm = mindloop_providers::perception_from_config(&config, llm.clone());
        let memory: Arc<dyn MemoryStore> = match config.storage.memory_backend.as_str() {
            "memory" => Arc::new(InMemoryStore::new()),
            _ => Arc::new(FileStore::new(config.storage.memory_path())),
        };
        Self::new(config, llm, perception_llm, memory)
    }

    pub fn new(
        config: AppConfig,
        llm: Arc<dyn Provider>,
        perception_llm: Arc<dyn Provider>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        let profile = load_profile(config.storage.persona_template.as_deref(), &config.agent.name);
        let recorder = Recorder::new(config.storage.data_dir.clone(), config.storage.enable_llm_logs);
        info!(
            agent = %profile.name,
            memory = memory.name(),
            llm_logs = recorder.is_enabled(),
            "Agent services ready"
        );
        Self {
            config: Arc::new(config),
            llm,
            perception_llm,
            memory,
            profile,
            recorder,
        }
    }
}

impl std::fmt::Debug for AgentServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentServices")
            .field("agent", &self.profile.name)
            .field("memory", &self.memory.name())
            .finish()
    }
}

struct RunHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One user's agent.
///
/// Inputs are queued FIFO and consumed one per tick. The queue is bounded;
/// `on_message` rejects input once it is full rather than dropping older
/// messages.
pub struct AgentRuntime {
    cycle: Arc<Cycle>,
    inputs: mpsc::Sender<String>,
    pending: Arc<Mutex<mpsc::Receiver<String>>>,
    capacity: usize,
    lifecycle: Mutex<Option<RunHandle>>,
    thinking_interval: Duration,
    error_cooldown: Duration,
}

impl AgentRuntime {
    pub fn new(user_id: impl Into<String>, services: &AgentServices) -> Self {
        let user_id = user_id.into();
        let config = &services.config;

        let mut dirs = StateDir::new(config.storage.data_dir.clone());
        if let Some(legacy) = &config.storage.legacy_dir {
            dirs = dirs.with_legacy(legacy.clone());
        }

        let agent_name = services.profile.name.clone();
        let working_memory = Arc::new(WorkingMemory::open(
            user_id.clone(),
            &dirs,
            WorkingMemoryConfig {
                history_limit: config.agent.history_limit,
                instant_memory_limit: config.agent.instant_memory_limit,
                agent_name: agent_name.clone(),
            },
        ));
        let persona = Arc::new(PersonaStore::open(
            user_id.clone(),
            &dirs,
            services.profile.clone(),
            PoolLimits {
                max_chains: config.agent.max_thinking_chains,
                max_steps: config.agent.max_chain_steps,
            },
        ));

        let cycle = Cycle {
            user_id,
            agent_name,
            user: UserProfile {
                name: config.agent.user_name.clone(),
                profile: config.agent.user_profile.clone(),
            },
            continuous_thinking: config.agent.continuous_thinking,
            working_memory,
            persona,
            memory: services.memory.clone(),
            registry: default_registry(),
            executor: ActionExecutor::new(config.agent.action_step_delay()),
            llm: services.llm.clone(),
            think_model: ModelSettings {
                model: config.thinking_model().to_string(),
                params: config.think.params(),
            },
            perception_llm: services.perception_llm.clone(),
            perception_model: ModelSettings {
                model: config.perception_model().to_string(),
                params: config.perception.params(),
            },
            recorder: services.recorder.clone(),
            bus: EventBus::default(),
        };

        let capacity = config.agent.input_queue_capacity.max(1);
        let (inputs, pending) = mpsc::channel(capacity);
        Self {
            cycle: Arc::new(cycle),
            inputs,
            pending: Arc::new(Mutex::new(pending)),
            capacity,
            lifecycle: Mutex::new(None),
            thinking_interval: config.agent.thinking_interval(),
            error_cooldown: config.agent.error_cooldown(),
        }
    }

    /// Start the background loop. No-op when already running.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return;
        }

        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            self.cycle.clone(),
            self.pending.clone(),
            signal,
            self.thinking_interval,
            self.error_cooldown,
        ));
        info!(user_id = %self.cycle.user_id, "Agent runtime started");
        *lifecycle = Some(RunHandle { shutdown, task });
    }

    /// Cancel the in-flight tick and wait for the loop to exit. No-op when
    /// not running.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(handle) = lifecycle.take() else {
            return;
        };
        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.task.await {
            warn!(user_id = %self.cycle.user_id, error = %e, "Agent loop ended abnormally");
        }
        info!(user_id = %self.cycle.user_id, "Agent runtime stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Queue user input for a later tick.
    pub fn on_message(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.inputs.try_send(text.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull(self.capacity),
            mpsc::error::TrySendError::Closed(_) => RuntimeError::Stopped,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.cycle.bus.subscribe()
    }

    pub fn user_id(&self) -> &str {
        &self.cycle.user_id
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn working_memory(&self) -> &Arc<WorkingMemory> {
        &self.cycle.working_memory
    }

    pub fn persona(&self) -> &Arc<PersonaStore> {
        &self.cycle.persona
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.cycle.registry
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.cycle.memory
    }

    pub fn bus(&self) -> &EventBus {
        &self.cycle.bus
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("cycle", &self.cycle)
            .field("capacity", &self.capacity)
            .finish()
    }
}

async fn run_loop(
    cycle: Arc<Cycle>,
    pending: Arc<Mutex<mpsc::Receiver<String>>>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
    cooldown: Duration,
) {
    let mut inputs = pending.lock().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let input = inputs.try_recv().ok();
        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = cycle.tick(input) => outcome,
        };

        let pause = match outcome {
            Ok(_) => interval,
            Err(e) => {
                error!(user_id = %cycle.user_id, error = %e, "Cycle tick failed");
                cycle.bus.publish(AgentEvent::log(AgentLog::Error {
                    content: e.to_string(),
                }));
                cycle.bus.publish(AgentEvent::Error {
                    message: e.to_string(),
                });
                cooldown
            }
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
}
