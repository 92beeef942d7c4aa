//! Watch error taxonomy.
//!
//! Transport failures are classified into a small set of distinct reasons
//! instead of surfacing raw client errors: "server not running" and
//! "server crashed mid-stream" call for different operator action. A watch
//! timeout is NOT an error — it is an ordinary [`WatchOutcome::Timeout`]
//! so callers can loop on it indefinitely without exception handling.
//!
//! [`WatchOutcome::Timeout`]: crate::watch::WatchOutcome::Timeout

/// Error type for the watch call.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The server refused the connection — it is probably not running.
    #[error("Cannot connect to the annotation server at {0}. Is it running?")]
    ConnectionRefused(String),

    /// The event stream ended before any timer fired — the server went
    /// away mid-stream.
    #[error("Event stream closed unexpectedly")]
    UnexpectedClose,

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Other(String),
}

impl WatchError {
    /// Classify a reqwest error from the initial connection attempt.
    pub(crate) fn from_connect(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_connect() {
            Self::ConnectionRefused(base_url.to_string())
        } else if err.is_timeout() {
            Self::Other(format!("connection timed out: {err}"))
        } else {
            Self::Other(err.to_string())
        }
    }

    /// Classify a reqwest error raised while reading the body stream.
    pub(crate) fn from_stream(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::UnexpectedClose
        } else {
            Self::Other(err.to_string())
        }
    }
}
