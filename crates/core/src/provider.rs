//! Provider trait — the text-generation contract.
//!
//! A Provider knows how to send a list of chat messages to a language model
//! and get text back. The cognitive cycle uses two flavours:
//!
//! - free-form generation (the reasoning step must tolerate prose around JSON)
//! - structured generation, which asks the backend for a strict JSON object
//!
//! Model, sampling parameters and output format are chosen per call. Endpoint
//! overrides are expressed by handing a stage a different `Provider` instance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Requested output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
}

/// Tunable sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: None,
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
        }
    }
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "qwen3:14b", "deepseek-chat")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Sampling parameters
    #[serde(default)]
    pub params: GenerationParams,

    /// Output format requested from the backend
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every text-generation backend implements `complete()`; the cycle calls the
/// `generate*` helpers without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Free-form generation.
    async fn generate(
        &self,
        messages: Vec<Message>,
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let response = self
            .complete(ProviderRequest {
                model: model.to_string(),
                messages,
                params: params.clone(),
                response_format: ResponseFormat::Text,
            })
            .await?;
        Ok(response.content)
    }

    /// Generation that asks the backend for a strict JSON object.
    ///
    /// The returned text is not validated here; callers decide how to degrade
    /// when it does not parse.
    async fn generate_json(
        &self,
        messages: Vec<Message>,
        model: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let response = self
            .complete(ProviderRequest {
                model: model.to_string(),
                messages,
                params: params.clone(),
                response_format: ResponseFormat::JsonObject,
            })
            .await?;
        Ok(response.content)
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
