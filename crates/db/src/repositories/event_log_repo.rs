//! Repository for the durable, sequence-indexed event log.
//!
//! The log persists exactly what it is given: sequence numbers are
//! allocated by the event bus, never here. A duplicate sequence is treated
//! as corruption and surfaced as [`EventLogError::Corrupt`] — the log never
//! silently overwrites.

use margin_core::{Event, Seq, Timestamp};
use uuid::Uuid;

use crate::models::event::EventRow;
use crate::DbPool;

/// Column list for `events` queries.
const COLUMNS: &str = "id, type, timestamp, session_id, sequence, payload";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for event log operations.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// A sequence number was written twice. The log is the ordering
    /// ground truth, so this is fatal — abort loudly, never overwrite.
    #[error("Event log corruption: duplicate sequence {0}")]
    Corrupt(Seq),

    /// The underlying database operation failed.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// EventLogRepo
// ---------------------------------------------------------------------------

/// Append-only persistence and range queries for events.
pub struct EventLogRepo;

impl EventLogRepo {
    /// Persist one event exactly as given.
    pub async fn append(pool: &DbPool, event: &Event) -> Result<(), EventLogError> {
        let payload = event
            .payload_json()
            .map_err(crate::models::decode_err)?
            .to_string();

        let result = sqlx::query(
            "INSERT INTO events (type, timestamp, session_id, sequence, payload) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.kind.type_name())
        .bind(event.timestamp)
        .bind(event.session_id.to_string())
        .bind(event.sequence)
        .bind(payload)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::error!(
                    sequence = event.sequence,
                    event_type = event.kind.type_name(),
                    "Refusing to overwrite an already-persisted sequence"
                );
                Err(EventLogError::Corrupt(event.sequence))
            }
            Err(e) => Err(EventLogError::Db(e)),
        }
    }

    /// Events for one session with sequence strictly greater than
    /// `after_sequence`, ascending. Used for reconnect replay, so the
    /// query is indexed on `(session_id, sequence)`.
    pub async fn range_since(
        pool: &DbPool,
        session_id: Uuid,
        after_sequence: Seq,
    ) -> Result<Vec<Event>, EventLogError> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE session_id = $1 AND sequence > $2 \
             ORDER BY sequence ASC"
        );
        let rows = sqlx::query_as::<_, EventRow>(&query)
            .bind(session_id.to_string())
            .bind(after_sequence)
            .fetch_all(pool)
            .await?;
        rows.into_iter()
            .map(|row| row.into_event().map_err(EventLogError::Db))
            .collect()
    }

    /// Events across all sessions with sequence strictly greater than
    /// `after_sequence`, ascending. Used by the domain-wide stream's
    /// replay; scope filtering happens in the caller.
    pub async fn range_since_all(
        pool: &DbPool,
        after_sequence: Seq,
    ) -> Result<Vec<Event>, EventLogError> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE sequence > $1 \
             ORDER BY sequence ASC"
        );
        let rows = sqlx::query_as::<_, EventRow>(&query)
            .bind(after_sequence)
            .fetch_all(pool)
            .await?;
        rows.into_iter()
            .map(|row| row.into_event().map_err(EventLogError::Db))
            .collect()
    }

    /// Highest persisted sequence, if any. Reported at startup so the bus
    /// resumes counting above it.
    pub async fn max_sequence(pool: &DbPool) -> Result<Option<Seq>, EventLogError> {
        let max: Option<Seq> = sqlx::query_scalar("SELECT MAX(sequence) FROM events")
            .fetch_one(pool)
            .await?;
        Ok(max)
    }

    /// Lowest retained sequence, if any. A reconnect cursor older than
    /// this means part of the replay window has been pruned away.
    pub async fn oldest_sequence(pool: &DbPool) -> Result<Option<Seq>, EventLogError> {
        let min: Option<Seq> = sqlx::query_scalar("SELECT MIN(sequence) FROM events")
            .fetch_one(pool)
            .await?;
        Ok(min)
    }

    /// Delete events older than `cutoff`. Run once at startup; anything a
    /// disconnected client missed beyond the retention window is
    /// permanently unreplayable afterwards.
    pub async fn prune_older_than(pool: &DbPool, cutoff: Timestamp) -> Result<u64, EventLogError> {
        let result = sqlx::query("DELETE FROM events WHERE timestamp < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use margin_core::{EventKind, Session, SessionStatus, SyncRequired};

    async fn test_pool() -> DbPool {
        let pool = crate::create_pool("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::init_schema(&pool).await.expect("schema");
        pool
    }

    fn session_event(session_id: Uuid, sequence: Seq) -> Event {
        let session = Session {
            id: session_id,
            url: "http://localhost:3000/".to_string(),
            status: SessionStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: None,
            project_id: None,
            owner: None,
        };
        Event {
            kind: EventKind::SessionCreated(session),
            session_id,
            sequence,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_range_returns_the_tail_for_every_cursor() {
        let pool = test_pool().await;
        let session = Uuid::new_v4();

        for seq in 1..=5 {
            EventLogRepo::append(&pool, &session_event(session, seq))
                .await
                .expect("append");
        }

        for cursor in 0..=5 {
            let tail = EventLogRepo::range_since(&pool, session, cursor)
                .await
                .expect("range");
            let sequences: Vec<Seq> = tail.iter().map(|e| e.sequence).collect();
            let expected: Vec<Seq> = ((cursor + 1)..=5).collect();
            assert_eq!(sequences, expected, "cursor {cursor}");
        }
    }

    #[tokio::test]
    async fn range_is_scoped_to_the_requested_session() {
        let pool = test_pool().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        EventLogRepo::append(&pool, &session_event(a, 1)).await.unwrap();
        EventLogRepo::append(&pool, &session_event(b, 2)).await.unwrap();
        EventLogRepo::append(&pool, &session_event(a, 3)).await.unwrap();

        let tail = EventLogRepo::range_since(&pool, a, 0).await.unwrap();
        let sequences: Vec<Seq> = tail.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 3]);
    }

    #[tokio::test]
    async fn duplicate_sequence_is_corruption_not_overwrite() {
        let pool = test_pool().await;
        let session = Uuid::new_v4();

        let first = session_event(session, 7);
        EventLogRepo::append(&pool, &first).await.expect("append");

        let mut second = session_event(session, 7);
        second.kind = EventKind::SyncRequired(SyncRequired {
            reason: "imposter".to_string(),
        });
        let err = EventLogRepo::append(&pool, &second).await.unwrap_err();
        assert_matches!(err, EventLogError::Corrupt(7));

        // The original row is untouched.
        let tail = EventLogRepo::range_since(&pool, session, 0).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_matches!(tail[0].kind, EventKind::SessionCreated(_));
    }

    #[tokio::test]
    async fn max_and_oldest_sequence_track_the_retained_window() {
        let pool = test_pool().await;
        let session = Uuid::new_v4();

        assert_eq!(EventLogRepo::max_sequence(&pool).await.unwrap(), None);
        assert_eq!(EventLogRepo::oldest_sequence(&pool).await.unwrap(), None);

        for seq in 3..=6 {
            EventLogRepo::append(&pool, &session_event(session, seq))
                .await
                .unwrap();
        }

        assert_eq!(EventLogRepo::max_sequence(&pool).await.unwrap(), Some(6));
        assert_eq!(EventLogRepo::oldest_sequence(&pool).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn prune_removes_only_events_older_than_the_cutoff() {
        let pool = test_pool().await;
        let session = Uuid::new_v4();

        let mut old = session_event(session, 1);
        old.timestamp = chrono::Utc::now() - chrono::Duration::days(10);
        EventLogRepo::append(&pool, &old).await.unwrap();

        let fresh = session_event(session, 2);
        EventLogRepo::append(&pool, &fresh).await.unwrap();

        let cutoff = chrono::Utc::now() - chrono::Duration::days(7);
        let deleted = EventLogRepo::prune_older_than(&pool, cutoff).await.unwrap();
        assert_eq!(deleted, 1);

        // Replay for the pruned range is permanently gone; the fresh
        // event survives and the retained window starts at it.
        assert_eq!(EventLogRepo::oldest_sequence(&pool).await.unwrap(), Some(2));
        let tail = EventLogRepo::range_since(&pool, session, 0).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, 2);
    }
}
