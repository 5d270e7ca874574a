//! Live agent sessions: WebSocket for clients that talk, SSE for clients
//! that only watch.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use mindloop_agent::AgentRuntime;
use mindloop_core::{AgentEvent, StateView};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{ApiResult, GatewayState, api_error};

/// `GET /ws/{user_id}`
///
/// - Client → Server: `{"content": "..."}`
/// - Server → Client: `AgentEvent` JSON frames
///
/// The user's runtime starts with the first connection and stops when the
/// last one closes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, state, user_id))
}

#[derive(Deserialize)]
struct ClientFrame {
    content: String,
}

async fn session(mut socket: WebSocket, state: GatewayState, user_id: String) {
    let runtime = state.registry.attach(&user_id).await;
    let mut events = runtime.subscribe();
    info!(user_id = %user_id, "WebSocket session opened");

    for event in greeting(&runtime, state.registry.services().config.gateway.send_history_on_connect) {
        if send(&mut socket, &event).await.is_err() {
            state.registry.detach(&user_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reply) = client_input(&runtime, text.as_str())
                        && send(&mut socket, &reply).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if send(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "WebSocket client fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.registry.detach(&user_id).await;
    info!(user_id = %user_id, "WebSocket session closed");
}

/// History (when enabled) then the full state, so a fresh client can render
/// without waiting for a tick.
fn greeting(runtime: &AgentRuntime, with_history: bool) -> Vec<AgentEvent> {
    let mut events = Vec::with_capacity(2);
    if with_history {
        events.push(AgentEvent::HistoryUpdate {
            history: runtime.working_memory().history(),
        });
    }
    events.push(AgentEvent::State {
        data: StateView {
            instant_memory: Some(runtime.working_memory().instant_memories()),
            ..StateView::from(&runtime.persona().get_state())
        },
    });
    events
}

/// Queue a client frame. Returns an error event to send back, if any.
fn client_input(runtime: &AgentRuntime, text: &str) -> Option<AgentEvent> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            return Some(AgentEvent::Error {
                message: format!("Invalid message: {e}"),
            });
        }
    };
    if frame.content.trim().is_empty() {
        return None;
    }
    debug!(user_id = %runtime.user_id(), len = frame.content.len(), "Client input queued");
    runtime
        .on_message(frame.content)
        .err()
        .map(|e| AgentEvent::Error { message: e.to_string() })
}

async fn send(socket: &mut WebSocket, event: &AgentEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap_or_default();
    socket.send(WsMessage::Text(json.into())).await
}

/// `GET /agent/{user_id}/events`
///
/// Watches an agent that some other session keeps alive.
pub async fn sse_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>> {
    let runtime: Arc<AgentRuntime> = state
        .registry
        .get(&user_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No agent running for '{user_id}'")))?;

    let stream = BroadcastStream::new(runtime.subscribe())
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.kind()).data(data))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::testing::TestGateway;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn greeting_sends_history_then_state() {
        let gateway = TestGateway::new();
        let runtime = gateway.state.registry.get_or_create("u1").await;
        runtime.working_memory().add_instant_memory("hello");

        let events = greeting(&runtime, true);
        assert!(matches!(events[0], AgentEvent::HistoryUpdate { .. }));
        match &events[1] {
            AgentEvent::State { data } => {
                assert!(data.goals.is_some());
                assert_eq!(data.instant_memory.as_deref(), Some(&["hello".to_string()][..]));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(greeting(&runtime, false).len(), 1);

        gateway.state.registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn client_frames() {
        let gateway = TestGateway::new();
        let runtime = gateway.state.registry.get_or_create("u1").await;

        assert!(client_input(&runtime, r#"{"content": "hi"}"#).is_none());
        assert!(client_input(&runtime, r#"{"content": "  "}"#).is_none());
        match client_input(&runtime, "not json") {
            Some(AgentEvent::Error { message }) => assert!(message.starts_with("Invalid message")),
            other => panic!("unexpected {other:?}"),
        }

        gateway.state.registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn sse_requires_running_agent() {
        let gateway = TestGateway::new();
        let request = || Request::builder().uri("/agent/u1/events").body(Body::empty()).unwrap();

        let response = build_router(gateway.state.clone()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        gateway.state.registry.get_or_create("u1").await;
        let response = build_router(gateway.state.clone()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );

        gateway.state.registry.shutdown_all().await;
    }
}
