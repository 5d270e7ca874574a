//! `mindloop status` — Show configuration summary and storage paths.

use std::path::Path;

pub fn run(path: &Path) -> anyhow::Result<()> {
    let config = super::load_config(path)?;
    let on_off = |flag: bool| if flag { "enabled" } else { "disabled" };

    println!("mindloop status");
    println!("===============");
    println!("  Config file:      {}", path.display());
    println!("  Agent:            {}", config.agent.name);
    println!("  Provider:         {}", config.llm.provider);
    println!("  Endpoint:         {}", config.llm.resolved_base_url());
    println!("  Thinking model:   {}", config.thinking_model());
    println!("  Perception model: {}", config.perception_model());
    println!("  Continuous:       {}", on_off(config.agent.continuous_thinking));
    println!("  Tick interval:    {:?}", config.agent.thinking_interval());
    println!("  Memory backend:   {}", config.storage.memory_backend);
    println!("  Data dir:         {}", config.storage.data_dir.display());
    if config.storage.memory_backend == "file" {
        println!("  Memory file:      {}", config.storage.memory_path().display());
    }
    if let Some(template) = &config.storage.persona_template {
        println!("  Persona template: {}", template.display());
    }
    if let Some(legacy) = &config.storage.legacy_dir {
        println!("  Legacy dir:       {}", legacy.display());
    }
    println!("  LLM logs:         {}", on_off(config.storage.enable_llm_logs));
    println!("  Gateway:          {}:{}", config.gateway.host, config.gateway.port);

    if path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `mindloop config init` to create one");
    }

    Ok(())
}
