use std::sync::Arc;

use crate::config::ServerConfig;
use crate::sse::SseRegistry;
use margin_events::WebhookDispatcher;
use margin_store::AnnotationStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: margin_db::DbPool,
    /// The single mutation path: store + event bus + event log.
    pub store: Arc<AnnotationStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// SSE connection registry (agent/browser delivery accounting).
    pub registry: Arc<SseRegistry>,
    /// Webhook fan-out for `action.requested` events.
    pub webhooks: Arc<WebhookDispatcher>,
}
