//! Event log row model.

use sqlx::FromRow;
use uuid::Uuid;

use margin_core::{Event, Seq, Timestamp};

use super::decode_err;

/// A row from the `events` table. `payload` holds the JSON-encoded
/// payload half of the envelope; the `type` tag selects its shape.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub timestamp: Timestamp,
    pub session_id: String,
    pub sequence: Seq,
    pub payload: String,
}

impl EventRow {
    /// Reassemble the persisted envelope.
    pub fn into_event(self) -> Result<Event, sqlx::Error> {
        let session_id = Uuid::parse_str(&self.session_id).map_err(decode_err)?;
        let payload: serde_json::Value =
            serde_json::from_str(&self.payload).map_err(decode_err)?;
        Event::from_parts(
            &self.event_type,
            session_id,
            self.sequence,
            self.timestamp,
            payload,
        )
        .map_err(decode_err)
    }
}
