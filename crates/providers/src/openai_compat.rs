//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, DeepSeek, SiliconFlow, Ollama's `/v1` endpoint, vLLM
//! and any other endpoint exposing `/chat/completions`.

use async_trait::async_trait;
use mindloop_core::error::ProviderError;
use mindloop_core::message::Message;
use mindloop_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with the default timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to configure HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Strip a routing prefix such as `ollama/qwen3:14b`.
    fn model_id<'a>(&self, model: &'a str) -> &'a str {
        model
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(model)
    }

    fn request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let params = &request.params;
        let mut body = serde_json::json!({
            "model": self.model_id(&request.model),
            "messages": Self::to_api_messages(&request.messages),
            "temperature": params.temperature,
            "stream": false,
        });

        if let Some(top_p) = params.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(penalty) = params.presence_penalty {
            body["presence_penalty"] = serde_json::json!(penalty);
        }
        if let Some(penalty) = params.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(penalty);
        }
        if let Some(seed) = params.seed {
            body["seed"] = serde_json::json!(seed);
        }
        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model.unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn spawn_backend(status: u16, reply: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    move |State(seen): State<Seen>, Json(body): Json<serde_json::Value>| {
                        let reply = reply.clone();
                        async move {
                            seen.lock().unwrap().push(body);
                            (
                                axum::http::StatusCode::from_u16(status).unwrap(),
                                Json(reply),
                            )
                        }
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), seen)
    }

    fn request(format: ResponseFormat) -> ProviderRequest {
        ProviderRequest {
            model: "ollama/qwen3:4b".into(),
            messages: vec![Message::system("Summarize"), Message::user("[HEARING]\n- hi")],
            params: GenerationParams {
                temperature: 0.3,
                top_p: Some(0.8),
                max_tokens: Some(2048),
                seed: Some(7),
                ..Default::default()
            },
            response_format: format,
        }
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn routing_prefix_is_stripped() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.model_id("ollama/qwen3:14b"), "qwen3:14b");
        assert_eq!(provider.model_id("deepseek-chat"), "deepseek-chat");
    }

    #[test]
    fn body_carries_sampling_and_format() {
        let provider = OpenAiCompatProvider::ollama(None);
        let body = provider.request_body(&request(ResponseFormat::JsonObject));
        assert_eq!(body["model"], "qwen3:4b");
        assert_eq!(body["seed"], 7);
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("presence_penalty").is_none());

        let body = provider.request_body(&request(ResponseFormat::Text));
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn complete_parses_first_choice() {
        let (url, seen) = spawn_backend(
            200,
            serde_json::json!({
                "model": "qwen3:4b",
                "choices": [{"message": {"role": "assistant", "content": "{\"summary\":\"hi\"}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }),
        )
        .await;

        let provider = OpenAiCompatProvider::new("ollama", url, "ollama");
        let response = provider.complete(request(ResponseFormat::JsonObject)).await.unwrap();
        assert_eq!(response.content, "{\"summary\":\"hi\"}");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(seen.lock().unwrap()[0]["model"], "qwen3:4b");
    }

    #[tokio::test]
    async fn error_statuses_are_mapped() {
        let (url, _) = spawn_backend(401, serde_json::json!({"error": "bad key"})).await;
        let provider = OpenAiCompatProvider::new("openai", url, "sk-bad");
        let err = provider.complete(request(ResponseFormat::Text)).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));

        let (url, _) = spawn_backend(500, serde_json::json!({"error": "boom"})).await;
        let provider = OpenAiCompatProvider::new("openai", url, "sk");
        let err = provider.complete(request(ResponseFormat::Text)).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let (url, _) = spawn_backend(200, serde_json::json!({"choices": []})).await;
        let provider = OpenAiCompatProvider::new("openai", url, "sk");
        let err = provider.complete(request(ResponseFormat::Text)).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
