//! Configuration loading, validation, and management for mindloop.
//!
//! Loads configuration from `~/.mindloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use mindloop_core::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.mindloop/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    /// Text-generation backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Sampling for the reasoning step
    #[serde(default)]
    pub think: ThinkConfig,

    /// Model, endpoint and sampling for the perception summarizer
    #[serde(default)]
    pub perception: PerceptionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

// --- [agent] ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Pause between ticks
    #[serde(default = "default_thinking_interval_ms")]
    pub thinking_interval_ms: u64,

    /// Pause after a failed tick
    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,

    /// Synthesize an "environment" sense when nothing was perceived
    #[serde(default)]
    pub continuous_thinking: bool,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_instant_memory_limit")]
    pub instant_memory_limit: usize,

    /// Pending inputs kept per user; further inputs are rejected
    #[serde(default = "default_input_queue_capacity")]
    pub input_queue_capacity: usize,

    /// Delay between an item turning `executing` and running
    #[serde(default = "default_action_step_delay_ms")]
    pub action_step_delay_ms: u64,

    #[serde(default = "default_max_thinking_chains")]
    pub max_thinking_chains: usize,

    #[serde(default = "default_max_chain_steps")]
    pub max_chain_steps: usize,

    /// How the agent refers to the person it talks to
    #[serde(default = "default_user_name")]
    pub user_name: String,

    #[serde(default)]
    pub user_profile: String,
}

fn default_agent_name() -> String {
    "Alice".into()
}
fn default_thinking_interval_ms() -> u64 {
    100
}
fn default_error_cooldown_ms() -> u64 {
    5000
}
fn default_history_limit() -> usize {
    20
}
fn default_instant_memory_limit() -> usize {
    13
}
fn default_input_queue_capacity() -> usize {
    64
}
fn default_action_step_delay_ms() -> u64 {
    500
}
fn default_max_thinking_chains() -> usize {
    8
}
fn default_max_chain_steps() -> usize {
    32
}
fn default_user_name() -> String {
    "User".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            thinking_interval_ms: default_thinking_interval_ms(),
            error_cooldown_ms: default_error_cooldown_ms(),
            continuous_thinking: false,
            history_limit: default_history_limit(),
            instant_memory_limit: default_instant_memory_limit(),
            input_queue_capacity: default_input_queue_capacity(),
            action_step_delay_ms: default_action_step_delay_ms(),
            max_thinking_chains: default_max_thinking_chains(),
            max_chain_steps: default_max_chain_steps(),
            user_name: default_user_name(),
            user_profile: String::new(),
        }
    }
}

impl AgentConfig {
    pub fn thinking_interval(&self) -> Duration {
        Duration::from_millis(self.thinking_interval_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    pub fn action_step_delay(&self) -> Duration {
        Duration::from_millis(self.action_step_delay_ms)
    }
}

// --- [llm] ---

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Endpoint base; defaults per provider when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String {
    "ollama".into()
}
fn default_llm_model() -> String {
    "qwen3:14b".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: None,
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None if self.provider == "openai" => "https://api.openai.com/v1".into(),
            None => "http://localhost:11434/v1".into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// --- [think] ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkConfig {
    /// Overrides `llm.model` for the reasoning step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_think_temperature")]
    pub temperature: f32,

    #[serde(default = "default_think_top_p")]
    pub top_p: f32,

    #[serde(default = "default_think_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub presence_penalty: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_think_temperature() -> f32 {
    0.7
}
fn default_think_top_p() -> f32 {
    0.9
}
fn default_think_max_tokens() -> u32 {
    8192
}

impl Default for ThinkConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_think_temperature(),
            top_p: default_think_top_p(),
            max_tokens: default_think_max_tokens(),
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            seed: None,
        }
    }
}

impl ThinkConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            top_p: Some(self.top_p),
            max_tokens: Some(self.max_tokens),
            presence_penalty: Some(self.presence_penalty),
            frequency_penalty: Some(self.frequency_penalty),
            seed: self.seed,
        }
    }
}

// --- [perception] ---

#[derive(Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Separate endpoint for the summarizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_perception_temperature")]
    pub temperature: f32,

    #[serde(default = "default_perception_top_p")]
    pub top_p: f32,

    #[serde(default = "default_perception_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_perception_temperature() -> f32 {
    0.3
}
fn default_perception_top_p() -> f32 {
    0.8
}
fn default_perception_max_tokens() -> u32 {
    2048
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            api_key: None,
            temperature: default_perception_temperature(),
            top_p: default_perception_top_p(),
            max_tokens: default_perception_max_tokens(),
            seed: None,
        }
    }
}

impl std::fmt::Debug for PerceptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptionConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("seed", &self.seed)
            .finish()
    }
}

impl PerceptionConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            top_p: Some(self.top_p),
            max_tokens: Some(self.max_tokens),
            presence_penalty: None,
            frequency_penalty: None,
            seed: self.seed,
        }
    }
}

// --- [storage] ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Per-user state records and LLM exchange logs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where records of an older install live, migrated once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_dir: Option<PathBuf>,

    /// JSON persona template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_template: Option<PathBuf>,

    /// "file" or "memory"
    #[serde(default = "default_memory_backend")]
    pub memory_backend: String,

    #[serde(default)]
    pub enable_llm_logs: bool,
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("storage")
}
fn default_memory_backend() -> String {
    "file".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            legacy_dir: None,
            persona_template: None,
            memory_backend: default_memory_backend(),
            enable_llm_logs: false,
        }
    }
}

impl StorageConfig {
    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("memories.jsonl")
    }
}

// --- [gateway] ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed origins; empty allows any (local development)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Send `history_update` on connect
    #[serde(default = "default_true")]
    pub send_history_on_connect: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: Vec::new(),
            send_history_on_connect: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, then apply
    /// environment overrides.
    ///
    /// `MINDLOOP_CONFIG` points at a different file.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("MINDLOOP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        Self::load_with_env(&config_path)
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Environment variables take priority over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("MINDLOOP_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("MINDLOOP_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("MINDLOOP_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("MINDLOOP_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup("MINDLOOP_THINKING_MODEL") {
            self.think.model = Some(model);
        }
        if let Some(model) = lookup("MINDLOOP_PERCEPTION_MODEL") {
            self.perception.model = Some(model);
        }
        if let Some(flag) = lookup("MINDLOOP_CONTINUOUS_THINKING") {
            self.agent.continuous_thinking = parse_flag(&flag);
        }
        if let Some(flag) = lookup("MINDLOOP_ENABLE_LLM_LOGS") {
            self.storage.enable_llm_logs = parse_flag(&flag);
        }
        if let Some(dir) = lookup("MINDLOOP_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mindloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, temperature) in [
            ("think", self.think.temperature),
            ("perception", self.perception.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        for (section, top_p) in [("think", self.think.top_p), ("perception", self.perception.top_p)] {
            if top_p <= 0.0 || top_p > 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.top_p must be in (0.0, 1.0]"
                )));
            }
        }

        if self.agent.history_limit == 0 || self.agent.instant_memory_limit == 0 {
            return Err(ConfigError::ValidationError(
                "history_limit and instant_memory_limit must be > 0".into(),
            ));
        }

        if self.agent.input_queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "input_queue_capacity must be > 0".into(),
            ));
        }

        if !matches!(self.storage.memory_backend.as_str(), "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory_backend '{}'",
                self.storage.memory_backend
            )));
        }

        Ok(())
    }

    /// Model used by the reasoning step.
    pub fn thinking_model(&self) -> &str {
        self.think.model.as_deref().unwrap_or(&self.llm.model)
    }

    /// Model used by the perception summarizer.
    pub fn perception_model(&self) -> &str {
        self.perception.model.as_deref().unwrap_or(&self.llm.model)
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.name, "Alice");
        assert_eq!(config.agent.instant_memory_limit, 13);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.history_limit, config.agent.history_limit);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.storage.data_dir, config.storage.data_dir);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.think.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_top_p_rejected() {
        let mut config = AppConfig::default();
        config.perception.top_p = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = AppConfig::default();
        config.agent.history_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.input_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.llm.model, "qwen3:14b");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[agent]\nname = \"Mira\"\ncontinuous_thinking = true\n\n[think]\nmodel = \"deepseek-reasoner\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.name, "Mira");
        assert!(config.agent.continuous_thinking);
        assert_eq!(config.agent.history_limit, 20);
        assert_eq!(config.thinking_model(), "deepseek-reasoner");
        assert_eq!(config.perception_model(), "qwen3:14b");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nname = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("MINDLOOP_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("MINDLOOP_PERCEPTION_MODEL", "qwen3:4b"),
            ("MINDLOOP_CONTINUOUS_THINKING", "true"),
            ("MINDLOOP_DATA_DIR", "/srv/mindloop"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.resolved_base_url(), "https://api.openai.com/v1");
        assert!(config.has_api_key());
        assert_eq!(config.perception_model(), "qwen3:4b");
        assert!(config.agent.continuous_thinking);
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/mindloop"));
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn think_params_carry_sampling() {
        let params = ThinkConfig::default().params();
        assert_eq!(params.top_p, Some(0.9));
        assert_eq!(params.max_tokens, Some(8192));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("thinking_interval_ms"));
    }
}
