//! Shared integration-test harness.
//!
//! Builds the full application router over an in-memory database so tests
//! exercise the same middleware stack (CORS, request ID, timeout, tracing,
//! panic recovery) that production uses.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use margin_api::config::ServerConfig;
use margin_api::router::build_app_router;
use margin_api::sse::SseRegistry;
use margin_api::state::AppState;
use margin_events::{EventBus, WebhookDispatcher};
use margin_store::AnnotationStore;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        webhook_urls: vec![],
        event_retention_days: 7,
    }
}

/// Build the application router plus its state, with webhook fan-out
/// pointed at the given URLs.
pub async fn build_test_app_with_webhooks(webhook_urls: Vec<String>) -> (Router, AppState) {
    let pool = margin_db::create_pool("sqlite::memory:")
        .await
        .expect("in-memory pool");
    margin_db::init_schema(&pool).await.expect("schema");

    let bus = Arc::new(EventBus::default());
    let store = Arc::new(AnnotationStore::new(pool.clone(), bus));

    let config = test_config();
    let state = AppState {
        pool,
        store,
        config: Arc::new(config.clone()),
        registry: Arc::new(SseRegistry::new()),
        webhooks: Arc::new(WebhookDispatcher::new(webhook_urls)),
    };

    (build_app_router(state.clone(), &config), state)
}

/// Build the application router with no webhooks configured.
pub async fn build_test_app() -> (Router, AppState) {
    build_test_app_with_webhooks(vec![]).await
}

/// Issue one request and return `(status, parsed JSON body)`.
pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
