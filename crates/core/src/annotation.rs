//! Annotation entity, thread messages, and the status state machine.
//!
//! Status only ever advances `pending -> acknowledged -> {resolved,
//! dismissed}`; the acknowledged step may be skipped. `resolved` and
//! `dismissed` are both terminal — there is no reopening.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// AnnotationStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a single annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationStatus {
    Pending,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AnnotationStatus {
    /// Return the status as its lowercase wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }

    /// Parse a status from its wire string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            _ => Err(CoreError::Validation(format!(
                "Invalid annotation status '{s}'. Must be one of: \
                 pending, acknowledged, resolved, dismissed"
            ))),
        }
    }

    /// Whether this status ends the annotation's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }

    /// Position in the forward-only lifecycle ordering.
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Acknowledged => 1,
            Self::Resolved | Self::Dismissed => 2,
        }
    }

    /// Whether a transition from `self` to `next` is a forward step.
    ///
    /// Terminal statuses admit no further transitions; equal or backward
    /// transitions are rejected. Callers treat a rejected transition as a
    /// defined no-op, not an error.
    pub fn can_advance_to(&self, next: AnnotationStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

// ---------------------------------------------------------------------------
// ThreadMessage
// ---------------------------------------------------------------------------

/// Author role for thread messages and resolution stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Agent,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "human" => Ok(Self::Human),
            "agent" => Ok(Self::Agent),
            _ => Err(CoreError::Validation(format!(
                "Invalid role '{s}'. Must be one of: human, agent"
            ))),
        }
    }
}

/// One message in an annotation's discussion thread. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Unix milliseconds, matching the browser-side wire format.
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// One piece of feedback anchored to a page element.
///
/// `metadata` carries the opaque DOM/spatial capture supplied by the
/// browser layer (coordinates, bounding box, nearby text, computed styles,
/// component hierarchy, ...). The engine stores and forwards it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: Uuid,
    pub session_id: Uuid,
    pub comment: String,
    pub element: String,
    pub element_path: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub status: AnnotationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thread: Vec<ThreadMessage>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<MessageRole>,
}

// ---------------------------------------------------------------------------
// Inbound DTOs
// ---------------------------------------------------------------------------

/// Payload for creating an annotation. The caller never controls the
/// status; new annotations always start `pending`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub element_path: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl NewAnnotation {
    /// Validate the required fields supplied by the browser layer.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.comment.trim().is_empty()
            || self.element.trim().is_empty()
            || self.element_path.trim().is_empty()
        {
            return Err(CoreError::Validation(
                "comment, element, and elementPath are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merge-patch payload for updating an annotation. Absent fields are left
/// untouched. `resolved_at`/`resolved_by` are deliberately not accepted
/// here; the store stamps them itself on terminal transitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPatch {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub status: Option<AnnotationStatus>,
    /// Actor claim used only when `status` is a terminal transition.
    #[serde(default)]
    pub resolved_by: Option<MessageRole>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
