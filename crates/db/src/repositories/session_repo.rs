//! Repository for the `sessions` table.

use margin_core::Session;
use uuid::Uuid;

use crate::models::session::SessionRow;
use crate::DbPool;

/// Column list for `sessions` queries.
const COLUMNS: &str = "id, url, status, created_at, updated_at, project_id, owner";

/// Provides CRUD operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a fully built session.
    pub async fn insert(pool: &DbPool, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (id, url, status, created_at, updated_at, project_id, owner) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.id.to_string())
        .bind(&session.url)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(&session.project_id)
        .bind(&session.owner)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a session by its ID.
    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// List all sessions, newest first.
    pub async fn list(pool: &DbPool) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Write back a session's status and update stamp. Returns false if
    /// the row no longer exists.
    pub async fn update_status(pool: &DbPool, session: &Session) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(session.status.as_str())
            .bind(session.updated_at)
            .bind(session.id.to_string())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
