//! Long-term memory CRUD plus read-only views of what the agent knows
//! about itself: its actions, its metacognition and its social state.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use mindloop_actions::default_registry;
use mindloop_agent::metacognition::{METACOGNITION, MetacognitiveEntry};
use mindloop_core::{ActionSchema, MemoryKind, MemoryPatch, MemoryRecord, NewMemory, SocialState};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{ApiError, ApiResult, GatewayState, api_error};

const DEFAULT_USER: &str = "default_user";
const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

fn store_error(e: impl std::fmt::Display) -> ApiError {
    error!(error = %e, "Memory store request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn parse_kind(raw: Option<&str>) -> ApiResult<Option<MemoryKind>> {
    raw.filter(|s| !s.is_empty())
        .map(MemoryKind::from_str)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryListResponse {
    pub memories: Vec<MemoryRecord>,
    pub count: usize,
}

/// `GET /memories?user_id&limit&query&type`
pub async fn list_handler(
    State(state): State<GatewayState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<MemoryListResponse>> {
    let kind = parse_kind(q.kind.as_deref())?;
    let user_id = q.user_id.as_deref().unwrap_or(DEFAULT_USER);
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let store = &state.registry.services().memory;

    let memories = match q.query.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(query) => store.search(query, user_id, limit, kind).await,
        None => store.list(user_id, limit, kind).await,
    }
    .map_err(store_error)?;

    let count = memories.len();
    Ok(Json(MemoryListResponse { memories, count }))
}

#[derive(Debug, Deserialize)]
pub struct CreateMemoryRequest {
    pub content: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMemoryResponse {
    pub id: String,
}

/// `POST /memories`
pub async fn create_handler(
    State(state): State<GatewayState>,
    Json(req): Json<CreateMemoryRequest>,
) -> ApiResult<(StatusCode, Json<CreateMemoryResponse>)> {
    if req.content.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "content must not be empty"));
    }
    let kind = parse_kind(req.kind.as_deref())?.unwrap_or(MemoryKind::Episodic);
    let user_id = req.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());

    let mut memory = NewMemory::new(req.content, user_id, kind).with_tags(req.tags);
    if let Some(importance) = req.importance {
        memory = memory.with_importance(importance.clamp(0.0, 1.0));
    }

    let id = state
        .registry
        .services()
        .memory
        .add(memory)
        .await
        .map_err(store_error)?;
    info!(memory_id = %id, kind = kind.as_str(), "Memory created via API");
    Ok((StatusCode::CREATED, Json(CreateMemoryResponse { id })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryChangeResponse {
    pub success: bool,
    pub id: String,
}

/// `PUT /memories/{id}`
pub async fn update_handler(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(patch): Json<MemoryPatch>,
) -> ApiResult<Json<MemoryChangeResponse>> {
    if patch.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No fields to update"));
    }
    let updated = state
        .registry
        .services()
        .memory
        .update(&id, patch)
        .await
        .map_err(store_error)?;
    if !updated {
        return Err(api_error(StatusCode::NOT_FOUND, format!("Memory '{id}' not found")));
    }
    Ok(Json(MemoryChangeResponse { success: true, id }))
}

/// `DELETE /memories/{id}`
pub async fn delete_handler(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryChangeResponse>> {
    let deleted = state
        .registry
        .services()
        .memory
        .delete(&id)
        .await
        .map_err(store_error)?;
    if !deleted {
        return Err(api_error(StatusCode::NOT_FOUND, format!("Memory '{id}' not found")));
    }
    Ok(Json(MemoryChangeResponse { success: true, id }))
}

#[derive(Debug, Deserialize)]
pub struct ActionsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `GET /memories/actions?user_id=`
///
/// A running agent reports its own registry, learned skills included.
pub async fn actions_handler(
    State(state): State<GatewayState>,
    Query(q): Query<ActionsQuery>,
) -> Json<Vec<ActionSchema>> {
    let runtime = match &q.user_id {
        Some(user_id) => state.registry.get(user_id).await,
        None => None,
    };
    let schemas = match runtime {
        Some(runtime) => runtime.registry().schemas(),
        None => default_registry().schemas(),
    };
    Json(schemas)
}

/// `GET /memories/metacognition`
pub async fn metacognition_handler() -> Json<&'static [MetacognitiveEntry]> {
    Json(&METACOGNITION)
}

/// `GET /memories/social_state/{user_id}`
pub async fn social_state_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SocialState>> {
    let social = state
        .registry
        .services()
        .memory
        .social_state(&user_id)
        .await
        .map_err(store_error)?;
    Ok(Json(social))
}
