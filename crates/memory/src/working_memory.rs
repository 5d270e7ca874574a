//! Working memory: conversation history, sense buffers and instant memory.
//!
//! One instance per user. Every mutating call persists synchronously while
//! still holding the lock, so a save always reflects a consistent state.
//! Save failures are logged and swallowed; the in-memory copy stays
//! authoritative.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use mindloop_core::{HistoryEntry, PersistenceError, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::persist::{StateDir, read_json, write_json};

/// Drained sense content, channels in first-written order.
pub type Senses = Vec<(String, Vec<String>)>;

#[derive(Debug, Clone)]
pub struct WorkingMemoryConfig {
    pub history_limit: usize,
    pub instant_memory_limit: usize,
    /// Legacy records stored the agent's name as the role.
    pub agent_name: String,
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            instant_memory_limit: 13,
            agent_name: "Alice".into(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Record {
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    instant_memory_queue: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    history: VecDeque<HistoryEntry>,
    senses: Senses,
    instant: VecDeque<String>,
}

pub struct WorkingMemory {
    user_id: String,
    path: Option<PathBuf>,
    config: WorkingMemoryConfig,
    inner: Mutex<Inner>,
}

impl WorkingMemory {
    /// A working memory that never touches disk.
    pub fn ephemeral(user_id: impl Into<String>, config: WorkingMemoryConfig) -> Self {
        Self {
            user_id: user_id.into(),
            path: None,
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Load the user's record, migrating a legacy record once if needed.
    pub fn open(user_id: impl Into<String>, dirs: &StateDir, config: WorkingMemoryConfig) -> Self {
        let user_id = user_id.into();
        let path = dirs.working_memory_path(&user_id);

        let (record, migrated) = match read_json::<Record>(&path) {
            Ok(Some(record)) => (record, false),
            Ok(None) => match Self::find_legacy(&user_id, dirs) {
                Some(record) => (record, true),
                None => (Record::default(), false),
            },
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Unreadable working memory, starting empty");
                (Record::default(), false)
            }
        };

        let memory = Self {
            user_id,
            path: Some(path),
            inner: Mutex::new(Inner::default()),
            config,
        };
        {
            let mut inner = memory.lock();
            memory.restore(&mut inner, record);
            if migrated {
                memory.persist(&inner);
            }
        }
        memory
    }

    fn find_legacy(user_id: &str, dirs: &StateDir) -> Option<Record> {
        for candidate in dirs.legacy_working_memory_paths(user_id) {
            match read_json::<Record>(&candidate) {
                Ok(Some(record)) => {
                    info!(user_id = %user_id, from = %candidate.display(), "Migrating working memory");
                    return Some(record);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Skipping unreadable legacy working memory"),
            }
        }
        None
    }

    fn restore(&self, inner: &mut Inner, record: Record) {
        let agent_name = self.config.agent_name.as_str();
        let mut history: VecDeque<HistoryEntry> = record
            .history
            .into_iter()
            .map(|mut entry| {
                if entry.role == "User" {
                    entry.role = Role::User.as_str().into();
                } else if entry.role == "Alice" || entry.role == agent_name {
                    entry.role = Role::Assistant.as_str().into();
                }
                entry
            })
            .collect();
        while history.len() > self.config.history_limit {
            history.pop_front();
        }

        let mut instant: VecDeque<String> = record.instant_memory_queue.into();
        while instant.len() > self.config.instant_memory_limit {
            instant.pop_front();
        }

        inner.history = history;
        inner.instant = instant;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, inner: &Inner) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.save_to(path, inner) {
            warn!(user_id = %self.user_id, error = %e, "Failed to persist working memory");
        }
    }

    fn save_to(&self, path: &std::path::Path, inner: &Inner) -> Result<(), PersistenceError> {
        let record = Record {
            history: inner.history.iter().cloned().collect(),
            instant_memory_queue: inner.instant.iter().cloned().collect(),
        };
        write_json(path, &record)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Append raw text to a sense channel.
    pub fn write_to_sense(&self, channel: &str, text: impl Into<String>) {
        let text = text.into();
        let mut inner = self.lock();
        match inner.senses.iter_mut().find(|(name, _)| name == channel) {
            Some((_, lines)) => lines.push(text),
            None => inner.senses.push((channel.to_string(), vec![text])),
        }
    }

    /// Snapshot every non-empty channel and empty them all.
    pub fn read_and_clear_senses(&self) -> Senses {
        let mut inner = self.lock();
        std::mem::take(&mut inner.senses)
            .into_iter()
            .filter(|(_, lines)| !lines.is_empty())
            .collect()
    }

    pub fn add_message(&self, entry: HistoryEntry) {
        let mut inner = self.lock();
        inner.history.push_back(entry);
        while inner.history.len() > self.config.history_limit {
            inner.history.pop_front();
        }
        self.persist(&inner);
    }

    /// Record an internal event. Its type doubles as the role.
    pub fn add_event(&self, kind: &str, content: impl Into<String>, data: Option<serde_json::Value>) {
        self.add_message(HistoryEntry::event(kind, content, data));
    }

    pub fn add_instant_memory(&self, text: impl Into<String>) {
        let mut inner = self.lock();
        inner.instant.push_back(text.into());
        while inner.instant.len() > self.config.instant_memory_limit {
            inner.instant.pop_front();
        }
        debug!(user_id = %self.user_id, size = inner.instant.len(), "Instant memory updated");
        self.persist(&inner);
    }

    /// Chat entries as `speaker: content` lines. Events are left out.
    pub fn context_string(&self) -> String {
        let inner = self.lock();
        inner
            .history
            .iter()
            .filter(|e| e.is_chat())
            .map(|e| format!("{}: {}", e.speaker(), e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Instant memory oldest to newest as `[i] text` lines.
    pub fn instant_memory_string(&self) -> String {
        let inner = self.lock();
        if inner.instant.is_empty() {
            return "(instant memory is empty)".into();
        }
        inner
            .instant
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[{}] {text}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn instant_memories(&self) -> Vec<String> {
        self.lock().instant.iter().cloned().collect()
    }

    /// Newest instant-memory entry.
    pub fn latest(&self) -> Option<String> {
        self.lock().instant.back().cloned()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.history.clear();
        inner.senses.clear();
        inner.instant.clear();
        self.persist(&inner);
    }
}

impl std::fmt::Debug for WorkingMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingMemory")
            .field("user_id", &self.user_id)
            .field("path", &self.path)
            .finish()
    }
}
