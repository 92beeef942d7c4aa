/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4747`).
    pub port: u16,
    /// Allowed CORS origins. The default `*` is intentional: the browser
    /// toolbar posts annotations from arbitrary page origins.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Applies to the
    /// response head only, so long-lived SSE streams are unaffected.
    pub request_timeout_secs: u64,
    /// Database URL (default: `sqlite://margin.db?mode=rwc`).
    pub database_url: String,
    /// Webhook URLs notified on `action.requested`, from
    /// `MARGIN_WEBHOOK_URL` (single) plus `MARGIN_WEBHOOKS`
    /// (comma-separated).
    pub webhook_urls: Vec<String>,
    /// Event retention window in days (default: `7`). Events older than
    /// this are pruned once at startup.
    pub event_retention_days: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                       |
    /// |-------------------------------|-------------------------------|
    /// | `HOST`                        | `0.0.0.0`                     |
    /// | `PORT`                        | `4747`                        |
    /// | `CORS_ORIGINS`                | `*`                           |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                          |
    /// | `DATABASE_URL`                | `sqlite://margin.db?mode=rwc` |
    /// | `MARGIN_WEBHOOK_URL`          | (unset)                       |
    /// | `MARGIN_WEBHOOKS`             | (unset)                       |
    /// | `MARGIN_EVENT_RETENTION_DAYS` | `7`                           |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "4747".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://margin.db?mode=rwc".into());

        let event_retention_days: i64 = std::env::var("MARGIN_EVENT_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse()
            .expect("MARGIN_EVENT_RETENTION_DAYS must be a valid integer");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            webhook_urls: webhook_urls_from_env(),
            event_retention_days,
        }
    }
}

/// Collect webhook URLs from `MARGIN_WEBHOOK_URL` (single) and
/// `MARGIN_WEBHOOKS` (comma-separated), in that order.
fn webhook_urls_from_env() -> Vec<String> {
    let mut urls = Vec::new();

    if let Ok(single) = std::env::var("MARGIN_WEBHOOK_URL") {
        let single = single.trim();
        if !single.is_empty() {
            urls.push(single.to_string());
        }
    }

    if let Ok(multiple) = std::env::var("MARGIN_WEBHOOKS") {
        urls.extend(
            multiple
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }

    urls
}
