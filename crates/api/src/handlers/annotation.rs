//! Handlers for annotation resources and their threads.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use margin_core::{AnnotationPatch, MessageRole, NewAnnotation};

use crate::error::{AppError, AppResult};
use crate::handlers::PendingResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

/// Body for appending a thread message.
#[derive(Debug, Deserialize)]
pub struct AddThreadMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// POST /sessions/{id}/annotations
///
/// Attach a new annotation to a session. Status always starts `pending`,
/// whatever the caller sent.
pub async fn create_annotation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<NewAnnotation>,
) -> AppResult<impl IntoResponse> {
    let annotation = state.store.add_annotation(session_id, input).await?;

    tracing::info!(
        session_id = %session_id,
        annotation_id = %annotation.id,
        "Annotation created"
    );

    Ok((StatusCode::CREATED, Json(annotation)))
}

/// GET /annotations/{id}
///
/// Get a single annotation by ID.
pub async fn get_annotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let annotation = state
        .store
        .get_annotation(id)
        .await?
        .ok_or(margin_core::CoreError::NotFound {
            entity: "Annotation",
            id,
        })?;
    Ok(Json(annotation))
}

/// PATCH /annotations/{id}
///
/// Merge-patch an annotation. Status changes go through the forward-only
/// lifecycle; terminal states are final and repeat transitions come back
/// unchanged.
pub async fn update_annotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AnnotationPatch>,
) -> AppResult<impl IntoResponse> {
    let annotation = state.store.update_annotation(id, patch).await?;

    tracing::info!(annotation_id = %id, status = annotation.status.as_str(), "Annotation updated");

    Ok(Json(annotation))
}

/// DELETE /annotations/{id}
///
/// Hard-delete an annotation.
pub async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.store.delete_annotation(id).await?;

    tracing::info!(annotation_id = %id, "Annotation deleted");

    Ok(Json(json!({ "deleted": true, "annotationId": id })))
}

/// POST /annotations/{id}/thread
///
/// Append a message to an annotation's discussion thread.
pub async fn add_thread_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AddThreadMessage>,
) -> AppResult<impl IntoResponse> {
    let (Some(role), Some(content)) = (input.role, input.content) else {
        return Err(AppError::BadRequest(
            "role and content are required".to_string(),
        ));
    };
    let role = MessageRole::parse(&role)?;

    let annotation = state.store.add_thread_message(id, role, content).await?;
    Ok((StatusCode::CREATED, Json(annotation)))
}

/// GET /pending
///
/// Pending annotations across all sessions, oldest first.
pub async fn get_all_pending(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let pending = state.store.get_all_pending().await?;
    Ok(Json(PendingResponse::new(pending)))
}
