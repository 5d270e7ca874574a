//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use mindloop_core::error::MemoryError;
use mindloop_core::memory::{MemoryKind, MemoryPatch, MemoryRecord, MemoryStore, NewMemory};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::search::rank;

/// A memory store that keeps records in a Vec.
pub struct InMemoryStore {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(rank(&records, query, user_id, limit, kind))
    }

    async fn add(&self, memory: NewMemory) -> Result<String, MemoryError> {
        let record = memory.into_record();
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                patch.apply(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        let len_before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < len_before)
    }
}
