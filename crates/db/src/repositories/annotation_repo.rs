//! Repository for the `annotations` table.

use margin_core::Annotation;
use uuid::Uuid;

use crate::models::annotation::{metadata_column, thread_column, AnnotationRow};
use crate::DbPool;

/// Column list for `annotations` queries.
const COLUMNS: &str = "id, session_id, comment, element, element_path, metadata, \
    intent, severity, status, thread, created_at, updated_at, resolved_at, resolved_by";

/// Provides CRUD operations for annotations.
pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Insert a fully built annotation.
    pub async fn insert(pool: &DbPool, annotation: &Annotation) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO annotations ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        sqlx::query(&query)
            .bind(annotation.id.to_string())
            .bind(annotation.session_id.to_string())
            .bind(&annotation.comment)
            .bind(&annotation.element)
            .bind(&annotation.element_path)
            .bind(metadata_column(annotation))
            .bind(&annotation.intent)
            .bind(&annotation.severity)
            .bind(annotation.status.as_str())
            .bind(thread_column(annotation)?)
            .bind(annotation.created_at)
            .bind(annotation.updated_at)
            .bind(annotation.resolved_at)
            .bind(annotation.resolved_by.map(|r| r.as_str()))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Find an annotation by its ID.
    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotations WHERE id = $1");
        let row = sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;
        row.map(AnnotationRow::into_annotation).transpose()
    }

    /// List all annotations for a session in creation order.
    pub async fn list_by_session(
        pool: &DbPool,
        session_id: Uuid,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations \
             WHERE session_id = $1 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(session_id.to_string())
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(AnnotationRow::into_annotation).collect()
    }

    /// List pending annotations for a session, oldest first (FIFO triage).
    pub async fn list_pending_by_session(
        pool: &DbPool,
        session_id: Uuid,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations \
             WHERE session_id = $1 AND status = 'pending' \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(session_id.to_string())
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(AnnotationRow::into_annotation).collect()
    }

    /// List pending annotations across all sessions, oldest first.
    pub async fn list_pending_all(pool: &DbPool) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations \
             WHERE status = 'pending' \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&query)
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(AnnotationRow::into_annotation).collect()
    }

    /// Write back a merged annotation. Returns false if the row no longer
    /// exists.
    pub async fn update(pool: &DbPool, annotation: &Annotation) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE annotations SET \
                comment = $1, metadata = $2, intent = $3, severity = $4, \
                status = $5, thread = $6, updated_at = $7, \
                resolved_at = $8, resolved_by = $9 \
             WHERE id = $10",
        )
        .bind(&annotation.comment)
        .bind(metadata_column(annotation))
        .bind(&annotation.intent)
        .bind(&annotation.severity)
        .bind(annotation.status.as_str())
        .bind(thread_column(annotation)?)
        .bind(annotation.updated_at)
        .bind(annotation.resolved_at)
        .bind(annotation.resolved_by.map(|r| r.as_str()))
        .bind(annotation.id.to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an annotation by its ID. Returns true if a row was deleted.
    pub async fn delete(pool: &DbPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = $1")
            .bind(id.to_string())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
