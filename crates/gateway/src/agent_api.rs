//! Read-only agent snapshots and the whitelisted external edits.
//!
//! Edits go through the same persona merge as the cycle and are broadcast
//! to connected clients afterwards.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use mindloop_agent::AgentRuntime;
use mindloop_core::{AgentEvent, IntentUpdate, PersonaUpdate, StateView};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiResult, GatewayState, api_error};

async fn runtime(state: &GatewayState, user_id: &str) -> ApiResult<Arc<AgentRuntime>> {
    state
        .registry
        .get(user_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No agent running for '{user_id}'")))
}

fn full_view(runtime: &AgentRuntime) -> StateView {
    StateView {
        instant_memory: Some(runtime.working_memory().instant_memories()),
        ..StateView::from(&runtime.persona().get_state())
    }
}

/// `GET /agent/{user_id}/state`
pub async fn state_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<StateView>> {
    let runtime = runtime(&state, &user_id).await?;
    Ok(Json(full_view(&runtime)))
}

#[derive(Debug, Deserialize)]
pub struct GoalsRequest {
    #[serde(default)]
    pub life_goal: Option<String>,
    #[serde(default)]
    pub long_term_goal: Option<String>,
}

/// `PUT /agent/{user_id}/goals`
pub async fn goals_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
    Json(req): Json<GoalsRequest>,
) -> ApiResult<Json<StateView>> {
    let runtime = runtime(&state, &user_id).await?;
    if req.life_goal.is_none() && req.long_term_goal.is_none() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No goals to update"));
    }

    runtime.persona().update_state(&PersonaUpdate::intent(IntentUpdate {
        life_goal: req.life_goal,
        long_term_goal: req.long_term_goal,
        ..Default::default()
    }));
    info!(user_id = %user_id, "Goals updated externally");

    let snapshot = runtime.persona().get_state();
    runtime.bus().publish(AgentEvent::state(&snapshot));
    Ok(Json(full_view(&runtime)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveChainResponse {
    pub success: bool,
    pub id: String,
}

/// `DELETE /agent/{user_id}/thinking-pool/{item_id}`
pub async fn remove_chain_handler(
    State(state): State<GatewayState>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<RemoveChainResponse>> {
    let runtime = runtime(&state, &user_id).await?;
    if !runtime.persona().remove_chain(&item_id) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Thinking chain '{item_id}' not found"),
        ));
    }
    info!(user_id = %user_id, chain_id = %item_id, "Thinking chain removed externally");

    runtime.bus().publish(AgentEvent::state(&runtime.persona().get_state()));
    Ok(Json(RemoveChainResponse {
        success: true,
        id: item_id,
    }))
}
