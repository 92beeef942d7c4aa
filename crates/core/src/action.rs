//! Action request payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::Annotation;
use crate::types::Timestamp;

/// The "send to agent" payload: a full snapshot of the session's
/// annotations plus the pre-formatted output the browser layer rendered.
/// Delivered to SSE listeners via an `action.requested` event and POSTed
/// verbatim to configured webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub session_id: Uuid,
    pub annotations: Vec<Annotation>,
    pub output: String,
    pub timestamp: Timestamp,
}
