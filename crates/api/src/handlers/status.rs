//! Server status handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub webhooks_configured: bool,
    pub webhook_count: usize,
    pub active_listeners: usize,
    pub agent_listeners: usize,
}

/// GET /status
///
/// Delivery accounting snapshot: configured webhooks and live SSE
/// connection counts.
pub async fn status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let webhook_count = state.webhooks.url_count();
    Ok(Json(StatusResponse {
        webhooks_configured: webhook_count > 0,
        webhook_count,
        active_listeners: state.registry.connection_count(),
        agent_listeners: state.registry.agent_count(),
    }))
}
