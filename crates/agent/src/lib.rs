//! Agent-side consumer for the margin annotation engine.
//!
//! Provides [`WatchClient`], the blocking batch-collection primitive
//! agents use instead of polling: drain any existing backlog, otherwise
//! wait for the first new annotation and coalesce a fixed batch window
//! before returning.

pub mod error;
pub mod sse;
pub mod watch;

pub use error::WatchError;
pub use sse::SseLineParser;
pub use watch::{WatchBatch, WatchClient, WatchOptions, WatchOutcome};
