//! File-based memory store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryRecord`. Records are loaded into
//! memory on creation and the whole file is rewritten after every mutation.
//!
//! Storage location: `{data_dir}/memories.jsonl`

use async_trait::async_trait;
use mindloop_core::error::MemoryError;
use mindloop_core::memory::{MemoryKind, MemoryPatch, MemoryRecord, MemoryStore, NewMemory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::search::rank;

/// A file-backed memory store using JSONL (one JSON object per line).
pub struct FileStore {
    path: PathBuf,
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file starts empty; it is created
    /// on first write.
    pub fn new(path: PathBuf) -> Self {
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "File memory store loaded");
        Self {
            path,
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory record");
                    None
                }
            })
            .collect()
    }

    /// Rewrite the file from the given records.
    fn flush(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| MemoryError::Serialization(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
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
        let mut records = self.records.write().await;
        records.push(record);
        self.flush(&records)?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        patch.apply(record);
        self.flush(&records)?;
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        let len_before = records.len();
        records.retain(|r| r.id != id);
        let deleted = records.len() < len_before;
        if deleted {
            self.flush(&records)?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn add_and_reload_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        let id = store
            .add(NewMemory::new("Rust is great", "u1", MemoryKind::Cognitive).with_importance(0.8))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Rust is great"));

        let reopened = FileStore::new(path);
        let record = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(record.kind, MemoryKind::Cognitive);
        assert!((record.importance - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let mut tmp = NamedTempFile::new().unwrap();
        let good = NewMemory::new("kept", "u1", MemoryKind::Episodic).into_record();
        writeln!(tmp, "{}", serde_json::to_string(&good).unwrap()).unwrap();
        writeln!(tmp, "{{broken").unwrap();
        tmp.flush().unwrap();

        let store = FileStore::new(tmp.path().to_path_buf());
        let all = store.list("u1", 10, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "kept");
    }

    #[tokio::test]
    async fn update_and_delete_rewrite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/memories.jsonl");
        let store = FileStore::new(path.clone());

        let id = store
            .add(NewMemory::new("first draft", "u1", MemoryKind::Episodic))
            .await
            .unwrap();
        let patch = MemoryPatch {
            content: Some("final text".into()),
            ..Default::default()
        };
        assert!(store.update(&id, patch).await.unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("final text"));

        assert!(store.delete(&id).await.unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().trim().is_empty());
    }
}
