//! Registry of live SSE connections.
//!
//! Connections are tagged agent or browser at creation, purely for
//! delivery accounting (the `/status` endpoint and the action endpoint's
//! delivery summary) — never for authorization or event filtering.
//!
//! Registration is scoped: [`SseRegistry::register`] returns a guard whose
//! drop deregisters the connection synchronously, so every exit path of a
//! stream (normal close, error, client disconnect) releases its slot.
//! Skipping this would leak one registry entry per stale connection,
//! compounding under reconnect storms.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

/// How a connection identified itself at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// An agent consumer (`?agent=true`), counted in delivery summaries.
    Agent,
    /// A browser toolbar connection.
    Browser,
}

/// Tracks all active SSE connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct SseRegistry {
    connections: RwLock<HashMap<Uuid, ConnectionKind>>,
}

impl SseRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return its deregistration guard.
    pub fn register(self: &Arc<Self>, kind: ConnectionKind) -> ConnectionGuard {
        let id = Uuid::new_v4();
        self.connections
            .write()
            .expect("registry lock poisoned")
            .insert(id, kind);
        ConnectionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Total number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .expect("registry lock poisoned")
            .len()
    }

    /// Number of live agent-tagged connections.
    pub fn agent_count(&self) -> usize {
        self.connections
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|kind| **kind == ConnectionKind::Agent)
            .count()
    }

    fn remove(&self, id: Uuid) {
        self.connections
            .write()
            .expect("registry lock poisoned")
            .remove(&id);
    }
}

impl Default for SseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deregisters its connection when dropped. Dropping twice is impossible
/// and removal of an already-removed id is a no-op, so disposal is
/// idempotent by construction.
pub struct ConnectionGuard {
    registry: Arc<SseRegistry>,
    id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
