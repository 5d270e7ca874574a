//! Per-user state records on disk.
//!
//! Each record is a single pretty-printed JSON document. Writes go through a
//! temporary file and a rename so a crash never leaves a half-written record.

use mindloop_core::PersistenceError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Where per-user records live, plus an optional older location to migrate from.
#[derive(Debug, Clone)]
pub struct StateDir {
    pub data_dir: PathBuf,
    pub legacy_dir: Option<PathBuf>,
}

impl StateDir {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            legacy_dir: None,
        }
    }

    pub fn with_legacy(mut self, legacy_dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = Some(legacy_dir.into());
        self
    }

    pub fn working_memory_path(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(format!("working_memory_{}.json", file_safe(user_id)))
    }

    pub fn persona_path(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(format!("persona_state_{}.json", file_safe(user_id)))
    }

    /// Legacy working-memory candidates, most specific first. Older installs
    /// named files after the raw id, so that name is tried when it is safe.
    pub fn legacy_working_memory_paths(&self, user_id: &str) -> Vec<PathBuf> {
        let Some(dir) = &self.legacy_dir else {
            return Vec::new();
        };
        let name = if is_plain(user_id) {
            user_id.to_string()
        } else {
            file_safe(user_id)
        };
        vec![
            dir.join(format!("working_memory_{name}.json")),
            dir.join("working_memory.json"),
        ]
    }

    pub fn legacy_persona_path(&self) -> Option<PathBuf> {
        self.legacy_dir.as_ref().map(|dir| dir.join("persona_state.json"))
    }
}

fn is_plain(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Map a user id to a file-name fragment that cannot escape the data
/// directory. One-to-one: every byte outside `[A-Za-z0-9-]`, `_` included,
/// becomes `_` plus two hex digits.
fn file_safe(user_id: &str) -> String {
    let mut out = String::with_capacity(user_id.len());
    for b in user_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

/// Read a record. A missing file is `Ok(None)`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PersistenceError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PersistenceError::Serialization {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let io_err = |e: std::io::Error| PersistenceError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Serialization {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
