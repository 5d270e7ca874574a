//! Explicit map from user id to that user's runtime, owned by the process
//! root and handed to whatever serves connections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::runtime::{AgentRuntime, AgentServices};

#[derive(Debug)]
struct Entry {
    runtime: Arc<AgentRuntime>,
    /// Live client sessions sharing this runtime.
    sessions: usize,
}

/// One runtime per user, shared by every session of that user. A runtime
/// stops when its last session detaches or when it is removed outright.
#[derive(Debug)]
pub struct AgentRegistry {
    services: AgentServices,
    runtimes: Mutex<HashMap<String, Entry>>,
}

impl AgentRegistry {
    pub fn new(services: AgentServices) -> Self {
        Self {
            services,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    pub fn services(&self) -> &AgentServices {
        &self.services
    }

    /// The user's runtime, created and started on first use. Does not count
    /// as a session.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<AgentRuntime> {
        self.checkout(user_id, false).await
    }

    /// Like `get_or_create`, and registers one more live session.
    pub async fn attach(&self, user_id: &str) -> Arc<AgentRuntime> {
        self.checkout(user_id, true).await
    }

    async fn checkout(&self, user_id: &str, session: bool) -> Arc<AgentRuntime> {
        let runtime = {
            let mut runtimes = self.runtimes.lock().await;
            let total = runtimes.len();
            let entry = runtimes.entry(user_id.to_string()).or_insert_with(|| {
                info!(user_id, total = total + 1, "Created agent runtime");
                Entry {
                    runtime: Arc::new(AgentRuntime::new(user_id, &self.services)),
                    sessions: 0,
                }
            });
            if session {
                entry.sessions += 1;
            }
            entry.runtime.clone()
        };
        runtime.start().await;
        runtime
    }

    /// End one session. The runtime is stopped and forgotten once no
    /// session is left; returns true when that happened.
    pub async fn detach(&self, user_id: &str) -> bool {
        // Stop under the lock: a reconnect waits until the old loop has exited.
        let mut runtimes = self.runtimes.lock().await;
        let Some(entry) = runtimes.get_mut(user_id) else {
            return false;
        };
        entry.sessions = entry.sessions.saturating_sub(1);
        if entry.sessions > 0 {
            debug!(user_id, sessions = entry.sessions, "Session closed, agent stays up");
            return false;
        }
        let Some(entry) = runtimes.remove(user_id) else {
            return false;
        };
        entry.runtime.stop().await;
        info!(user_id, "Last session closed, agent stopped");
        true
    }

    pub async fn sessions(&self, user_id: &str) -> usize {
        self.runtimes
            .lock()
            .await
            .get(user_id)
            .map_or(0, |entry| entry.sessions)
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<AgentRuntime>> {
        self.runtimes
            .lock()
            .await
            .get(user_id)
            .map(|entry| entry.runtime.clone())
    }

    pub async fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runtimes.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop and forget a user's runtime regardless of live sessions.
    /// Returns false if none existed.
    pub async fn remove(&self, user_id: &str) -> bool {
        let removed = self.runtimes.lock().await.remove(user_id);
        match removed {
            Some(entry) => {
                entry.runtime.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn shutdown_all(&self) {
        let entries: Vec<Entry> = self.runtimes.lock().await.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.runtime.stop().await;
        }
        info!(count = entries.len(), "All agent runtimes stopped");
    }
}
