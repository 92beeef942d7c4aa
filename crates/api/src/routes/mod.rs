pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::sse;
use crate::state::AppState;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// GET    /status                       delivery accounting snapshot
/// GET    /events                       site-wide SSE stream (?domain=, ?agent=)
/// GET    /pending                      pending annotations, all sessions
///
/// GET    /sessions                     list sessions
/// POST   /sessions                     create session
/// GET    /sessions/{id}                session with annotations
/// PATCH  /sessions/{id}                update session status
/// GET    /sessions/{id}/events         session SSE stream (?agent=)
/// GET    /sessions/{id}/pending        pending annotations for session
/// POST   /sessions/{id}/action         request agent action (+ webhooks)
/// POST   /sessions/{id}/annotations    create annotation
///
/// GET    /annotations/{id}             get annotation
/// PATCH  /annotations/{id}             merge-patch annotation
/// DELETE /annotations/{id}             delete annotation
/// POST   /annotations/{id}/thread      append thread message
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::status::status))
        .route("/events", get(sse::handler::domain_events))
        .route("/pending", get(handlers::annotation::get_all_pending))
        .route(
            "/sessions",
            get(handlers::session::list_sessions).post(handlers::session::create_session),
        )
        .route(
            "/sessions/{id}",
            get(handlers::session::get_session).patch(handlers::session::update_session_status),
        )
        .route("/sessions/{id}/events", get(sse::handler::session_events))
        .route("/sessions/{id}/pending", get(handlers::session::get_pending))
        .route("/sessions/{id}/action", post(handlers::action::request_action))
        .route(
            "/sessions/{id}/annotations",
            post(handlers::annotation::create_annotation),
        )
        .route(
            "/annotations/{id}",
            get(handlers::annotation::get_annotation)
                .patch(handlers::annotation::update_annotation)
                .delete(handlers::annotation::delete_annotation),
        )
        .route(
            "/annotations/{id}/thread",
            post(handlers::annotation::add_thread_message),
        )
}
