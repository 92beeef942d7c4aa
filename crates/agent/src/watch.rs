//! The blocking watch/batch-collection call.
//!
//! One call reconciles three concerns: work may already be waiting, the
//! caller must block for new work, and rapid bursts should coalesce into
//! one batch. The flow:
//!
//! 1. Query current pending annotations. Any backlog returns immediately —
//!    a consumer re-polling after a previous batch never waits through
//!    first-event latency for work that already arrived.
//! 2. Otherwise open the SSE stream (agent-tagged) and race two timers: an
//!    overall deadline, and a batch window that starts at the first
//!    qualifying event and never resets — a fixed window anchored to the
//!    first event, so a continuous trickle cannot postpone delivery
//!    forever.
//! 3. Whichever timer fires first wins. The select loop settles the call
//!    exactly once, and dropping the response/timers tears everything down
//!    on every path, so cancellation is idempotent by construction.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::time::Instant;
use uuid::Uuid;

use margin_core::{Annotation, EventKind, SYNC_SEQUENCE};

use crate::error::WatchError;
use crate::sse::SseLineParser;

/// Overall deadline bounds and default (seconds).
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Batch window bounds and default (seconds).
const MIN_BATCH_WINDOW_SECS: u64 = 1;
const MAX_BATCH_WINDOW_SECS: u64 = 60;
const DEFAULT_BATCH_WINDOW_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// Options for a watch call.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Restrict the watch to one session; `None` watches every session.
    pub session_id: Option<Uuid>,
    /// Overall deadline. Clamped to [1, 300] seconds.
    pub timeout: Duration,
    /// Batch window, anchored at the first qualifying event. Clamped to
    /// [1, 60] seconds.
    pub batch_window: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_window: Duration::from_secs(DEFAULT_BATCH_WINDOW_SECS),
        }
    }
}

impl WatchOptions {
    /// The effective (clamped) deadline and batch window.
    pub fn clamped(&self) -> (Duration, Duration) {
        (
            clamp_secs(self.timeout, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
            clamp_secs(self.batch_window, MIN_BATCH_WINDOW_SECS, MAX_BATCH_WINDOW_SECS),
        )
    }
}

fn clamp_secs(value: Duration, min_secs: u64, max_secs: u64) -> Duration {
    value.clamp(Duration::from_secs(min_secs), Duration::from_secs(max_secs))
}

/// A delivered batch of annotations.
#[derive(Debug, Clone)]
pub struct WatchBatch {
    /// Annotations in arrival order.
    pub annotations: Vec<Annotation>,
    /// Every distinct session touched, in first-seen order.
    pub session_ids: Vec<Uuid>,
}

impl WatchBatch {
    fn from_annotations(annotations: Vec<Annotation>) -> Self {
        let mut session_ids = Vec::new();
        for annotation in &annotations {
            if !session_ids.contains(&annotation.session_id) {
                session_ids.push(annotation.session_id);
            }
        }
        Self {
            annotations,
            session_ids,
        }
    }
}

/// Terminal outcome of a watch call. A timeout is ordinary output, not an
/// error — callers loop on it indefinitely.
#[derive(Debug)]
pub enum WatchOutcome {
    /// New (or backlogged) annotations.
    Batch(WatchBatch),
    /// The deadline passed with no qualifying event.
    Timeout,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    annotations: Vec<Annotation>,
}

// ---------------------------------------------------------------------------
// WatchClient
// ---------------------------------------------------------------------------

/// HTTP/SSE client for the watch primitive.
pub struct WatchClient {
    base_url: String,
    http: reqwest::Client,
}

impl WatchClient {
    /// Create a client for a server base URL (e.g. `http://localhost:4747`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Block until a batch of new annotations arrives or the deadline
    /// passes. See the module docs for the full state machine.
    pub async fn watch(&self, options: &WatchOptions) -> Result<WatchOutcome, WatchError> {
        let (deadline, batch_window) = options.clamped();

        // Fast path: backlog that already arrived is returned at once.
        let backlog = self.fetch_pending(options.session_id).await?;
        if !backlog.is_empty() {
            return Ok(WatchOutcome::Batch(WatchBatch::from_annotations(backlog)));
        }

        let stream_url = match options.session_id {
            Some(session_id) => {
                format!("{}/sessions/{session_id}/events?agent=true", self.base_url)
            }
            None => format!("{}/events?agent=true", self.base_url),
        };

        let response = self
            .http
            .get(&stream_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| WatchError::from_connect(e, &self.base_url))?;

        if !response.status().is_success() {
            return Err(WatchError::Other(format!(
                "server returned HTTP {} for the event stream",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut parser = SseLineParser::new();
        let mut collected: Vec<Annotation> = Vec::new();

        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);
        // Not armed until the first qualifying event; never reset after.
        let mut window_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                () = &mut deadline_sleep => {
                    // Deadline with nothing collected is an ordinary
                    // timeout; with a partial window it delivers early.
                    return Ok(settle(collected));
                }
                () = arm(window_deadline) => {
                    return Ok(WatchOutcome::Batch(WatchBatch::from_annotations(collected)));
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.push(&bytes) {
                            // Sequence 0 is the synthetic initial-sync
                            // marker; backlog was handled by the fast path.
                            if event.sequence == SYNC_SEQUENCE {
                                continue;
                            }
                            let EventKind::AnnotationCreated(annotation) = event.kind else {
                                continue;
                            };
                            if let Some(wanted) = options.session_id {
                                if event.session_id != wanted {
                                    continue;
                                }
                            }
                            if window_deadline.is_none() {
                                window_deadline = Some(Instant::now() + batch_window);
                            }
                            collected.push(annotation);
                        }
                    }
                    Some(Err(err)) => {
                        if collected.is_empty() {
                            return Err(WatchError::from_stream(err));
                        }
                        // Data already gathered outranks a dying stream.
                        return Ok(settle(collected));
                    }
                    None => {
                        if collected.is_empty() {
                            return Err(WatchError::UnexpectedClose);
                        }
                        return Ok(settle(collected));
                    }
                }
            }
        }
    }

    /// Query the pending backlog (session-scoped or global).
    async fn fetch_pending(&self, session_id: Option<Uuid>) -> Result<Vec<Annotation>, WatchError> {
        let url = match session_id {
            Some(session_id) => format!("{}/sessions/{session_id}/pending", self.base_url),
            None => format!("{}/pending", self.base_url),
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WatchError::from_connect(e, &self.base_url))?;

        if !response.status().is_success() {
            return Err(WatchError::Other(format!(
                "server returned HTTP {} for pending query",
                response.status()
            )));
        }

        let pending: PendingResponse = response
            .json()
            .await
            .map_err(|e| WatchError::Other(format!("invalid pending response: {e}")))?;
        Ok(pending.annotations)
    }
}

/// Resolve a finished wait into its outcome.
fn settle(collected: Vec<Annotation>) -> WatchOutcome {
    if collected.is_empty() {
        WatchOutcome::Timeout
    } else {
        WatchOutcome::Batch(WatchBatch::from_annotations(collected))
    }
}

/// Sleep until the batch window closes, or forever while it is unarmed.
async fn arm(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
