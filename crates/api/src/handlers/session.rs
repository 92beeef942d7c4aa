//! Handlers for session resources.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use margin_core::{CoreError, SessionStatus};

use crate::error::{AppError, AppResult};
use crate::handlers::PendingResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

/// Body for creating a session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Body for updating a session's status.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionStatus {
    pub status: String,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// POST /sessions
///
/// Create a new annotation session for a page URL.
pub async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSession>,
) -> AppResult<impl IntoResponse> {
    let url = input
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("url is required".to_string()))?;

    let session = state
        .store
        .create_session(url, input.project_id, input.owner)
        .await?;

    tracing::info!(session_id = %session.id, url = %session.url, "Session created");

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions
///
/// List all sessions, newest first.
pub async fn list_sessions(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let sessions = state.store.list_sessions().await?;
    Ok(Json(sessions))
}

/// GET /sessions/{id}
///
/// Get a session together with all of its annotations.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let session = state
        .store
        .get_session_with_annotations(id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Session",
            id,
        })?;
    Ok(Json(session))
}

/// PATCH /sessions/{id}
///
/// Update a session's status. Closing a session emits `session.closed`.
pub async fn update_session_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSessionStatus>,
) -> AppResult<impl IntoResponse> {
    let status = SessionStatus::parse(&input.status)?;
    let session = state.store.update_session_status(id, status).await?;

    tracing::info!(session_id = %id, status = status.as_str(), "Session status updated");

    Ok(Json(session))
}

/// GET /sessions/{id}/pending
///
/// Pending annotations for one session, oldest first.
pub async fn get_pending(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let pending = state.store.get_pending_annotations(id).await?;
    Ok(Json(PendingResponse::new(pending)))
}
