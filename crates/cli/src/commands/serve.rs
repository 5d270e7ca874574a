//! `mindloop serve` — Host agents behind the gateway.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mindloop_agent::{AgentRegistry, AgentServices};
use tracing::{info, warn};

pub async fn run(path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    if config.llm.provider != "ollama" && !config.has_api_key() {
        warn!(provider = %config.llm.provider, "No API key set (MINDLOOP_API_KEY or OPENAI_API_KEY)");
    }

    println!("mindloop gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.thinking_model(), config.llm.provider);
    println!("   Storage:   {}", config.storage.data_dir.display());

    let registry = Arc::new(AgentRegistry::new(AgentServices::from_config(config)));
    mindloop_gateway::serve(registry, shutdown_signal())
        .await
        .context("Gateway stopped with an error")?;

    info!("All agents stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; stop the process to exit");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
