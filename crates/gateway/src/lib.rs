//! Host API for mindloop.
//!
//! - `GET /ws/{user_id}`: bidirectional agent session
//! - `GET /agent/{user_id}/events`: the same event stream over SSE
//! - `/agent/{user_id}/...`: state snapshot and whitelisted edits
//! - `/memories/...`: long-term memory CRUD, the action catalogue,
//!   metacognition and social state
//!
//! Built on Axum. Every agent lives in the shared [`AgentRegistry`].

pub mod agent_api;
pub mod memories;
pub mod stream;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::Json;
use axum::routing::{delete, get, put};
use mindloop_agent::AgentRegistry;
use mindloop_config::GatewayConfig;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for every route.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<AgentRegistry>,
}

impl GatewayState {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Build the router with every route and layer.
pub fn build_router(state: GatewayState) -> Router {
    let cors = cors_layer(&state.registry.services().config.gateway);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/{user_id}", get(stream::ws_handler))
        .route("/agent/{user_id}/events", get(stream::sse_handler))
        .route("/agent/{user_id}/state", get(agent_api::state_handler))
        .route("/agent/{user_id}/goals", put(agent_api::goals_handler))
        .route(
            "/agent/{user_id}/thinking-pool/{item_id}",
            delete(agent_api::remove_chain_handler),
        )
        .route("/memories/actions", get(memories::actions_handler))
        .route("/memories/metacognition", get(memories::metacognition_handler))
        .route(
            "/memories/social_state/{user_id}",
            get(memories::social_state_handler),
        )
        .route(
            "/memories",
            get(memories::list_handler).post(memories::create_handler),
        )
        .route(
            "/memories/{id}",
            put(memories::update_handler).delete(memories::delete_handler),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
}

/// An empty list or `*` allows any origin; otherwise only the listed ones.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Serve until `shutdown` resolves, then stop every runtime.
pub async fn serve(
    registry: Arc<AgentRegistry>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let gateway = &registry.services().config.gateway;
    let addr = format!("{}:{}", gateway.host, gateway.port);

    let app = build_router(GatewayState::new(registry.clone()));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    registry.shutdown_all().await;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use mindloop_agent::{AgentRegistry, AgentServices};
    use mindloop_config::AppConfig;
    use mindloop_core::{Provider, ProviderError, ProviderRequest, ProviderResponse};
    use mindloop_memory::InMemoryStore;
    use tower::ServiceExt;

    use super::{GatewayState, build_router};

    /// Always decides to do nothing.
    struct IdleProvider;

    #[async_trait]
    impl Provider for IdleProvider {
        fn name(&self) -> &str {
            "idle"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                content: "{}".into(),
                model: request.model,
                usage: None,
            })
        }
    }

    pub struct TestGateway {
        pub state: GatewayState,
        _dir: tempfile::TempDir,
    }

    impl TestGateway {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = AppConfig::default();
            config.storage.data_dir = dir.path().to_path_buf();
            config.agent.continuous_thinking = false;
            config.gateway.cors_origins = vec!["*".into()];
            let provider: Arc<dyn Provider> = Arc::new(IdleProvider);
            let services = AgentServices::new(
                config,
                provider.clone(),
                provider,
                Arc::new(InMemoryStore::new()),
            );
            Self {
                state: GatewayState::new(Arc::new(AgentRegistry::new(services))),
                _dir: dir,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
            let response = build_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let json = if body.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
            };
            (status, json)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        pub async fn send_json(
            &self,
            method: &str,
            uri: &str,
            body: serde_json::Value,
        ) -> (StatusCode, serde_json::Value) {
            self.send(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }
    }
}
