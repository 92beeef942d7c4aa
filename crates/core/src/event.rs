//! Event envelope and payload union.
//!
//! Every state change produces exactly one [`Event`] (thread appends
//! produce two; see the store crate). The envelope is immutable once
//! written: `{type, sessionId, sequence, timestamp, payload}` on the wire,
//! with the payload shape determined by the type tag. Consumers match on
//! [`EventKind`] exhaustively instead of probing loosely-typed fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionRequest;
use crate::annotation::{Annotation, ThreadMessage};
use crate::session::Session;
use crate::types::{Seq, Timestamp};

/// Sequence number reserved for synthetic, never-persisted events such as
/// [`EventKind::SyncRequired`]. Real sequences start at 1.
pub const SYNC_SEQUENCE: Seq = 0;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Event payload union, keyed by the wire-level `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    #[serde(rename = "session.created")]
    SessionCreated(Session),
    #[serde(rename = "session.updated")]
    SessionUpdated(Session),
    #[serde(rename = "session.closed")]
    SessionClosed(Session),
    #[serde(rename = "annotation.created")]
    AnnotationCreated(Annotation),
    #[serde(rename = "annotation.updated")]
    AnnotationUpdated(Annotation),
    #[serde(rename = "annotation.deleted")]
    AnnotationDeleted(Annotation),
    #[serde(rename = "thread.message")]
    ThreadMessage(ThreadMessage),
    #[serde(rename = "action.requested")]
    ActionRequested(ActionRequest),
    /// Synthetic marker sent to a reconnecting client whose replay cursor
    /// predates the retained event window: refetch full state instead of
    /// trusting the stream to be gapless.
    #[serde(rename = "sync.required")]
    SyncRequired(SyncRequired),
}

/// Payload of a `sync.required` marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequired {
    pub reason: String,
}

impl EventKind {
    /// The wire-level `type` tag for this payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionCreated(_) => "session.created",
            Self::SessionUpdated(_) => "session.updated",
            Self::SessionClosed(_) => "session.closed",
            Self::AnnotationCreated(_) => "annotation.created",
            Self::AnnotationUpdated(_) => "annotation.updated",
            Self::AnnotationDeleted(_) => "annotation.deleted",
            Self::ThreadMessage(_) => "thread.message",
            Self::ActionRequested(_) => "action.requested",
            Self::SyncRequired(_) => "sync.required",
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable, sequence-numbered record of a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub session_id: Uuid,
    pub sequence: Seq,
    pub timestamp: Timestamp,
}

impl Event {
    /// Serialize only the payload half of the envelope, as stored in the
    /// event log's `payload` column.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(&self.kind)?;
        Ok(tagged
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Reassemble an event from its persisted columns.
    ///
    /// Fails if the stored `type`/`payload` pair does not describe any
    /// known event kind — a corrupt log row, not a recoverable condition.
    pub fn from_parts(
        type_name: &str,
        session_id: Uuid,
        sequence: Seq,
        timestamp: Timestamp,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let kind: EventKind = serde_json::from_value(serde_json::json!({
            "type": type_name,
            "payload": payload,
        }))?;
        Ok(Self {
            kind,
            session_id,
            sequence,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
