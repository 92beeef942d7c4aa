//! Fire-and-forget webhook fan-out.
//!
//! [`WebhookDispatcher`] POSTs a JSON-encoded [`ActionRequest`] to every
//! statically configured URL. Each delivery runs as its own task: a slow or
//! failing endpoint cannot delay the triggering request or the other
//! deliveries. There are no retries and no dead-lettering — a failed
//! delivery is logged and permanently lost for that event.

use std::time::Duration;

use margin_core::ActionRequest;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures. Only ever observed in logs;
/// delivery outcomes are never surfaced to the triggering caller.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDispatcher
// ---------------------------------------------------------------------------

/// Delivers action requests to external webhook endpoints.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl WebhookDispatcher {
    /// Create a dispatcher for a fixed URL list with a pre-configured
    /// HTTP client.
    pub fn new(urls: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, urls }
    }

    /// Number of configured webhook URLs.
    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    /// Fan an action request out to every configured URL.
    ///
    /// Spawns one independent fire-and-forget task per URL and returns the
    /// dispatched count immediately. Individual outcomes are only
    /// observable via logs.
    pub fn dispatch(&self, request: &ActionRequest) -> usize {
        if self.urls.is_empty() {
            return 0;
        }

        for url in &self.urls {
            let client = self.client.clone();
            let url = url.clone();
            let payload = request.clone();
            tokio::spawn(async move {
                match Self::try_send(&client, &url, &payload).await {
                    Ok(status) => {
                        tracing::info!(%url, status, "Webhook delivered");
                    }
                    Err(e) => {
                        tracing::warn!(%url, error = %e, "Webhook delivery failed");
                    }
                }
            });
        }

        tracing::info!(
            count = self.urls.len(),
            session_id = %request.session_id,
            "Dispatched webhooks for action request"
        );
        self.urls.len()
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(
        client: &reqwest::Client,
        url: &str,
        request: &ActionRequest,
    ) -> Result<u16, WebhookError> {
        let response = client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
