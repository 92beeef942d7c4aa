//! HTTP server for the margin annotation engine.
//!
//! Exposes the session/annotation CRUD surface, the SSE event streams
//! (session-scoped and domain-wide, with reconnect replay), the action
//! endpoint with webhook fan-out, and status/health probes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod sse;
pub mod state;
