//! `mindloop config` — Configuration management commands.

use std::path::Path;

use anyhow::{Context, bail};
use mindloop_config::AppConfig;

pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote default config to {}", path.display());
    Ok(())
}

pub fn show(path: &Path) -> anyhow::Result<()> {
    let config = super::load_config(path)?;
    println!("{}", render(&config)?);
    Ok(())
}

pub fn validate(path: &Path) -> anyhow::Result<()> {
    println!("Validating {}", path.display());
    let config = super::load_config(path)?;
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        for w in &warnings {
            println!("   warning: {w}");
        }
    }
    Ok(())
}

/// TOML with the API key masked.
fn render(config: &AppConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

/// Problems that do not stop the gateway from starting but will hurt.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.llm.provider != "ollama" && !config.has_api_key() {
        warnings.push(format!(
            "provider '{}' usually needs an API key (MINDLOOP_API_KEY)",
            config.llm.provider
        ));
    }
    if let Some(template) = &config.storage.persona_template
        && !template.exists()
    {
        warnings.push(format!(
            "persona template {} not found; the built-in persona will be used",
            template.display()
        ));
    }
    if let Some(legacy) = &config.storage.legacy_dir
        && !legacy.is_dir()
    {
        warnings.push(format!("legacy_dir {} does not exist", legacy.display()));
    }
    if config.gateway.host == "0.0.0.0" && config.gateway.cors_origins.is_empty() {
        warnings.push("gateway bound to 0.0.0.0 with every origin allowed".into());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        let written = AppConfig::load_from(&path).unwrap();
        assert_eq!(written.gateway.port, AppConfig::default().gateway.port);

        assert!(init(&path, false).is_err());
        init(&path, true).unwrap();
    }

    #[test]
    fn render_masks_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let rendered = render(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn warnings_flag_missing_files_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        assert!(warnings(&config).is_empty());

        config.llm.provider = "openai".into();
        config.storage.persona_template = Some(dir.path().join("missing.json"));
        config.storage.legacy_dir = Some(dir.path().to_path_buf());
        let found = warnings(&config);
        assert_eq!(found.len(), 2);
        assert!(found[0].contains("API key"));
        assert!(found[1].contains("persona template"));
    }
}
