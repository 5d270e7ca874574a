//! Optional JSONL capture of every perception and reasoning exchange.

use chrono::{DateTime, Utc};
use mindloop_core::Message;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const PERCEPTION_LOG: &str = "perception_logs.jsonl";
pub const THOUGHT_LOG: &str = "thought_logs.jsonl";

#[derive(Debug, Serialize)]
struct ExchangeEntry<'a> {
    timestamp: DateTime<Utc>,
    user_id: &'a str,
    input: &'a [Message],
    output: &'a str,
}

#[derive(Debug, Clone)]
pub struct Recorder {
    dir: Option<PathBuf>,
}

impl Recorder {
    /// Writes into `dir` when enabled, otherwise drops everything.
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: enabled.then(|| dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub async fn log_perception(&self, user_id: &str, input: &[Message], output: &str) {
        self.append(PERCEPTION_LOG, user_id, input, output).await;
    }

    pub async fn log_thought(&self, user_id: &str, input: &[Message], output: &str) {
        self.append(THOUGHT_LOG, user_id, input, output).await;
    }

    async fn append(&self, file: &str, user_id: &str, input: &[Message], output: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let entry = ExchangeEntry {
            timestamp: Utc::now(),
            user_id,
            input,
            output,
        };
        let path = dir.join(file);
        if let Err(e) = write_line(&path, &entry).await {
            warn!(path = %path.display(), error = %e, "Failed to record LLM exchange");
        }
    }
}

async fn write_line(path: &Path, entry: &impl Serialize) -> std::io::Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path(), true);
        let input = vec![Message::system("prompt")];
        recorder.log_thought("u1", &input, "{}").await;
        recorder.log_thought("u1", &input, "{\"a\":1}").await;

        let text = std::fs::read_to_string(dir.path().join(THOUGHT_LOG)).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["output"], "{\"a\":1}");
        assert_eq!(lines[0]["user_id"], "u1");
        assert_eq!(lines[0]["input"][0]["role"], "system");
    }

    #[tokio::test]
    async fn disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path(), false);
        recorder.log_perception("u1", &[], "x").await;
        assert!(!dir.path().join(PERCEPTION_LOG).exists());
    }
}
