//! Session entity and status lifecycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::Annotation;
use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an annotation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Approved,
    Closed,
}

impl SessionStatus {
    /// Return the status as its lowercase wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Approved => "approved",
            Self::Closed => "closed",
        }
    }

    /// Parse a status from its wire string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "approved" => Ok(Self::Approved),
            "closed" => Ok(Self::Closed),
            _ => Err(CoreError::Validation(format!(
                "Invalid session status '{s}'. Must be one of: active, approved, closed"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A unit of annotation activity scoped to one page URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub url: String,
    pub status: SessionStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A session together with all of its annotations, as returned by the
/// session detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithAnnotations {
    #[serde(flatten)]
    pub session: Session,
    pub annotations: Vec<Annotation>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_round_trips_through_wire_string() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Approved,
            SessionStatus::Closed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_matches!(
            SessionStatus::parse("archived"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn session_serializes_with_camel_case_fields() {
        let session = Session {
            id: Uuid::new_v4(),
            url: "http://localhost:3000/checkout".to_string(),
            status: SessionStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: None,
            project_id: Some("shop".to_string()),
            owner: None,
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["projectId"], "shop");
        assert!(json.get("createdAt").is_some());
        // Absent optionals are omitted, not null.
        assert!(json.get("updatedAt").is_none());
        assert!(json.get("owner").is_none());
    }
}
