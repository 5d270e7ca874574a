pub mod actions;
pub mod config_cmd;
pub mod serve;
pub mod status;

use std::path::Path;

use anyhow::Context;
use mindloop_config::AppConfig;

/// Load the file at `path` (defaults when missing), with env overrides.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_with_env(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
