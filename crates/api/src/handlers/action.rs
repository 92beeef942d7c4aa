//! Handler for the "send to agent" action endpoint.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body for requesting agent action.
#[derive(Debug, Deserialize)]
pub struct RequestAction {
    #[serde(default)]
    pub output: Option<String>,
}

/// Delivery accounting returned to the caller so it can tell whether
/// anyone actually received the request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivered {
    pub sse_listeners: usize,
    pub webhooks: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub annotation_count: usize,
    pub delivered: Delivered,
}

/// POST /sessions/{id}/action
///
/// Emits an `action.requested` event carrying the session's annotations
/// and the caller's pre-formatted output, then fans the request out to
/// configured webhooks. Webhook delivery is fire-and-forget: the response
/// returns immediately with a delivery-count summary, and individual
/// webhook outcomes are only observable via logs.
///
/// Only agent-tagged SSE connections are counted as listeners — a browser
/// toolbar watching its own session is not a delivery target.
pub async fn request_action(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<RequestAction>,
) -> AppResult<impl IntoResponse> {
    let output = input
        .output
        .filter(|output| !output.is_empty())
        .ok_or_else(|| AppError::BadRequest("output is required".to_string()))?;

    let request = state.store.record_action_request(session_id, output).await?;

    let webhooks = state.webhooks.dispatch(&request);
    let sse_listeners = state.registry.agent_count();

    tracing::info!(
        session_id = %session_id,
        annotation_count = request.annotations.len(),
        sse_listeners,
        webhooks,
        "Action requested"
    );

    Ok(Json(ActionResponse {
        success: true,
        annotation_count: request.annotations.len(),
        delivered: Delivered {
            sse_listeners,
            webhooks,
            total: sse_listeners + webhooks,
        },
    }))
}
