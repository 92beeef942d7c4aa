//! Session row model.

use sqlx::FromRow;
use uuid::Uuid;

use margin_core::{Session, SessionStatus, Timestamp};

use super::decode_err;

/// A row from the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub url: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub project_id: Option<String>,
    pub owner: Option<String>,
}

impl SessionRow {
    /// Convert the row into its domain type.
    pub fn into_session(self) -> Result<Session, sqlx::Error> {
        Ok(Session {
            id: Uuid::parse_str(&self.id).map_err(decode_err)?,
            url: self.url,
            status: SessionStatus::parse(&self.status).map_err(decode_err)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            project_id: self.project_id,
            owner: self.owner,
        })
    }
}
