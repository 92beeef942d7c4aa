//! Incremental SSE frame parsing.
//!
//! Stream chunks arrive at arbitrary byte boundaries, so input is buffered
//! up to the last newline and only complete lines are interpreted. Only
//! `data:` lines matter to the consumer — the envelope JSON repeats the
//! type and sequence carried by the `event:` / `id:` lines — and lines
//! that fail to parse are skipped rather than poisoning the stream.

use margin_core::Event;

/// Buffering line parser for an SSE byte stream.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: String,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of stream bytes; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        // Keep the trailing partial line buffered for the next chunk.
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let complete: String = self.buffer.drain(..=last_newline).collect();

        complete
            .lines()
            .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            .filter_map(|data| match serde_json::from_str::<Event>(data.trim()) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unparseable SSE data line");
                    None
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
