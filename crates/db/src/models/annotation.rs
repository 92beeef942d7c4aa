//! Annotation row model.

use sqlx::FromRow;
use uuid::Uuid;

use margin_core::{Annotation, AnnotationStatus, MessageRole, ThreadMessage, Timestamp};

use super::decode_err;

/// A row from the `annotations` table. The `metadata` and `thread`
/// columns hold JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct AnnotationRow {
    pub id: String,
    pub session_id: String,
    pub comment: String,
    pub element: String,
    pub element_path: String,
    pub metadata: Option<String>,
    pub intent: Option<String>,
    pub severity: Option<String>,
    pub status: String,
    pub thread: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<String>,
}

impl AnnotationRow {
    /// Convert the row into its domain type.
    pub fn into_annotation(self) -> Result<Annotation, sqlx::Error> {
        let metadata = match self.metadata {
            Some(json) => serde_json::from_str(&json).map_err(decode_err)?,
            None => serde_json::Value::Null,
        };
        let thread: Vec<ThreadMessage> = match self.thread {
            Some(json) => serde_json::from_str(&json).map_err(decode_err)?,
            None => Vec::new(),
        };
        let resolved_by = self
            .resolved_by
            .as_deref()
            .map(MessageRole::parse)
            .transpose()
            .map_err(decode_err)?;

        Ok(Annotation {
            id: Uuid::parse_str(&self.id).map_err(decode_err)?,
            session_id: Uuid::parse_str(&self.session_id).map_err(decode_err)?,
            comment: self.comment,
            element: self.element,
            element_path: self.element_path,
            metadata,
            intent: self.intent,
            severity: self.severity,
            status: AnnotationStatus::parse(&self.status).map_err(decode_err)?,
            thread,
            created_at: self.created_at,
            updated_at: self.updated_at,
            resolved_at: self.resolved_at,
            resolved_by,
        })
    }
}

/// Serialize an annotation's metadata for its TEXT column (NULL when the
/// browser layer supplied none).
pub fn metadata_column(annotation: &Annotation) -> Option<String> {
    if annotation.metadata.is_null() {
        None
    } else {
        Some(annotation.metadata.to_string())
    }
}

/// Serialize an annotation's thread for its TEXT column (NULL when empty).
pub fn thread_column(annotation: &Annotation) -> Result<Option<String>, sqlx::Error> {
    if annotation.thread.is_empty() {
        Ok(None)
    } else {
        serde_json::to_string(&annotation.thread)
            .map(Some)
            .map_err(decode_err)
    }
}
