use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use margin_api::config::ServerConfig;
use margin_api::router::build_app_router;
use margin_api::sse::SseRegistry;
use margin_api::state::AppState;
use margin_db::repositories::EventLogRepo;
use margin_events::{EventBus, WebhookDispatcher};
use margin_store::AnnotationStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "margin_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = margin_db::create_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    tracing::info!(url = %config.database_url, "Database pool created");

    margin_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    margin_db::init_schema(&pool)
        .await
        .expect("Failed to initialize database schema");
    tracing::info!("Database schema ready");

    // --- Retention sweep ---
    // Runs once at startup, not continuously. Replay for anything older
    // than the window is permanently lost; reconnecting clients past the
    // window receive an explicit sync.required marker.
    let cutoff = chrono::Utc::now() - chrono::Duration::days(config.event_retention_days);
    let pruned = EventLogRepo::prune_older_than(&pool, cutoff)
        .await
        .expect("Failed to prune expired events");
    tracing::info!(
        pruned,
        retention_days = config.event_retention_days,
        "Expired events pruned"
    );

    // --- Event bus ---
    // Resume the global sequence above the highest persisted value so a
    // sequence number is never reused across restarts.
    let max_sequence = EventLogRepo::max_sequence(&pool)
        .await
        .expect("Failed to read max persisted sequence")
        .unwrap_or(0);
    let bus = Arc::new(EventBus::starting_after(max_sequence));
    tracing::info!(resumed_after = max_sequence, "Event bus created");

    // --- Services ---
    let store = Arc::new(AnnotationStore::new(pool.clone(), Arc::clone(&bus)));
    let registry = Arc::new(SseRegistry::new());
    let webhooks = Arc::new(WebhookDispatcher::new(config.webhook_urls.clone()));
    if webhooks.url_count() > 0 {
        tracing::info!(count = webhooks.url_count(), "Webhook fan-out configured");
    }

    // --- App state / router ---
    let state = AppState {
        pool,
        store,
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        webhooks,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    let open_streams = registry.connection_count();
    tracing::info!(open_streams, "Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
