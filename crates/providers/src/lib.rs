//! Text-generation backends for mindloop.
//!
//! All providers implement the `mindloop_core::Provider` trait. The cycle
//! holds two handles: one for the reasoning step and one for the
//! perception summarizer, which may point at a different endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use mindloop_config::AppConfig;
use mindloop_core::Provider;
use std::sync::Arc;

/// Build the main provider from `[llm]`.
pub fn from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let llm = &config.llm;
    let api_key = llm.api_key.clone().unwrap_or_else(|| llm.provider.clone());
    Arc::new(OpenAiCompatProvider::with_timeout(
        llm.provider.clone(),
        llm.resolved_base_url(),
        api_key,
        llm.timeout(),
    ))
}

/// Build the perception provider: a separate client when `[perception]`
/// overrides the endpoint, otherwise the main one.
pub fn perception_from_config(config: &AppConfig, main: Arc<dyn Provider>) -> Arc<dyn Provider> {
    let perception = &config.perception;
    match &perception.base_url {
        Some(url) => {
            let api_key = perception
                .api_key
                .clone()
                .or_else(|| config.llm.api_key.clone())
                .unwrap_or_else(|| config.llm.provider.clone());
            tracing::info!(base_url = %url, "Using dedicated perception endpoint");
            Arc::new(OpenAiCompatProvider::with_timeout(
                config.llm.provider.clone(),
                url.clone(),
                api_key,
                config.llm.timeout(),
            ))
        }
        None => main,
    }
}
