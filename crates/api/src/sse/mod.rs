//! SSE transport: long-lived event streams with reconnect replay.

pub mod handler;
pub mod registry;

pub use registry::{ConnectionGuard, ConnectionKind, SseRegistry};
