//! The session/annotation store.
//!
//! Mutations follow one shape: write the row, emit the event on the bus
//! (which allocates the sequence and notifies live subscribers), then
//! append the returned event to the durable log. The bus and the log stay
//! decoupled — a crash between the two loses at most one event without
//! corrupting sequencing.
//!
//! Absence of a parent entity is a typed [`CoreError::NotFound`] inside
//! the `Result`, never a panic.

use std::sync::Arc;

use uuid::Uuid;

use margin_core::{
    ActionRequest, Annotation, AnnotationPatch, AnnotationStatus, CoreError, Event, EventKind,
    MessageRole, NewAnnotation, Seq, Session, SessionStatus, SessionWithAnnotations,
    ThreadMessage,
};
use margin_db::repositories::{AnnotationRepo, EventLogError, EventLogRepo, SessionRepo};
use margin_db::DbPool;
use margin_events::EventBus;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error (not found, validation).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An event log failure, including sequence corruption.
    #[error(transparent)]
    EventLog(#[from] EventLogError),
}

/// Convenience alias for store return values.
pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// AnnotationStore
// ---------------------------------------------------------------------------

/// CRUD and status transitions over sessions, annotations, and thread
/// messages. Every mutation produces exactly one event (thread appends
/// produce two, by design).
pub struct AnnotationStore {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl AnnotationStore {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// The event bus this store emits on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Emit on the bus, then persist the allocated event.
    async fn emit_and_persist(&self, kind: EventKind, session_id: Uuid) -> StoreResult<Event> {
        let event = self.bus.emit(kind, session_id);
        EventLogRepo::append(&self.pool, &event).await?;
        Ok(event)
    }

    // -- Sessions -----------------------------------------------------------

    /// Create a session for a page URL. Always succeeds; status starts
    /// `active`. Emits `session.created`.
    pub async fn create_session(
        &self,
        url: String,
        project_id: Option<String>,
        owner: Option<String>,
    ) -> StoreResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            url,
            status: SessionStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: None,
            project_id,
            owner,
        };
        SessionRepo::insert(&self.pool, &session).await?;

        self.emit_and_persist(EventKind::SessionCreated(session.clone()), session.id)
            .await?;
        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(SessionRepo::find_by_id(&self.pool, id).await?)
    }

    pub async fn get_session_with_annotations(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<SessionWithAnnotations>> {
        let Some(session) = SessionRepo::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        let annotations = AnnotationRepo::list_by_session(&self.pool, id).await?;
        Ok(Some(SessionWithAnnotations {
            session,
            annotations,
        }))
    }

    pub async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(SessionRepo::list(&self.pool).await?)
    }

    /// Update a session's status. Emits `session.closed` when the session
    /// is being closed, otherwise `session.updated`.
    pub async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> StoreResult<Session> {
        let mut session = SessionRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Session",
                id,
            })?;

        session.status = status;
        session.updated_at = Some(chrono::Utc::now());
        SessionRepo::update_status(&self.pool, &session).await?;

        let kind = if status == SessionStatus::Closed {
            EventKind::SessionClosed(session.clone())
        } else {
            EventKind::SessionUpdated(session.clone())
        };
        self.emit_and_persist(kind, id).await?;
        Ok(session)
    }

    // -- Annotations --------------------------------------------------------

    /// Add an annotation to a session. The status is forced to `pending`
    /// regardless of caller input. Emits `annotation.created`.
    pub async fn add_annotation(
        &self,
        session_id: Uuid,
        data: NewAnnotation,
    ) -> StoreResult<Annotation> {
        data.validate()?;

        if SessionRepo::find_by_id(&self.pool, session_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "Session",
                id: session_id,
            }
            .into());
        }

        let annotation = Annotation {
            id: Uuid::new_v4(),
            session_id,
            comment: data.comment,
            element: data.element,
            element_path: data.element_path,
            metadata: data.metadata,
            intent: data.intent,
            severity: data.severity,
            status: AnnotationStatus::Pending,
            thread: Vec::new(),
            created_at: chrono::Utc::now(),
            updated_at: None,
            resolved_at: None,
            resolved_by: None,
        };
        AnnotationRepo::insert(&self.pool, &annotation).await?;

        self.emit_and_persist(
            EventKind::AnnotationCreated(annotation.clone()),
            session_id,
        )
        .await?;
        Ok(annotation)
    }

    pub async fn get_annotation(&self, id: Uuid) -> StoreResult<Option<Annotation>> {
        Ok(AnnotationRepo::find_by_id(&self.pool, id).await?)
    }

    /// Merge-patch an annotation. Emits `annotation.updated` carrying the
    /// full post-update snapshot, not a diff.
    ///
    /// A `status` field in the patch goes through the forward-only status
    /// machine: transitions that do not advance (terminal states, backward
    /// steps, same status) are defined no-ops. A patch that changes
    /// nothing returns the current snapshot without emitting.
    pub async fn update_annotation(
        &self,
        id: Uuid,
        patch: AnnotationPatch,
    ) -> StoreResult<Annotation> {
        let mut annotation = AnnotationRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Annotation",
                id,
            })?;

        let mut changed = false;
        if let Some(comment) = patch.comment {
            annotation.comment = comment;
            changed = true;
        }
        if let Some(metadata) = patch.metadata {
            annotation.metadata = metadata;
            changed = true;
        }
        if let Some(intent) = patch.intent {
            annotation.intent = Some(intent);
            changed = true;
        }
        if let Some(severity) = patch.severity {
            annotation.severity = Some(severity);
            changed = true;
        }
        if let Some(status) = patch.status {
            if annotation.status.can_advance_to(status) {
                annotation.status = status;
                if status.is_terminal() {
                    // Stamped here, never taken from the caller, so a
                    // remote peer cannot spoof resolution time.
                    annotation.resolved_at = Some(chrono::Utc::now());
                    annotation.resolved_by =
                        Some(patch.resolved_by.unwrap_or(MessageRole::Agent));
                }
                changed = true;
            }
        }

        if !changed {
            return Ok(annotation);
        }

        annotation.updated_at = Some(chrono::Utc::now());
        AnnotationRepo::update(&self.pool, &annotation).await?;

        self.emit_and_persist(
            EventKind::AnnotationUpdated(annotation.clone()),
            annotation.session_id,
        )
        .await?;
        Ok(annotation)
    }

    /// Advance an annotation's status. Terminal statuses are final:
    /// repeated or backward transitions return the current snapshot
    /// unchanged, with no event.
    pub async fn update_annotation_status(
        &self,
        id: Uuid,
        status: AnnotationStatus,
        resolved_by: Option<MessageRole>,
    ) -> StoreResult<Annotation> {
        self.update_annotation(
            id,
            AnnotationPatch {
                status: Some(status),
                resolved_by,
                ..AnnotationPatch::default()
            },
        )
        .await
    }

    /// Append a message to an annotation's thread.
    ///
    /// Emits two events: `thread.message` with the message alone, then the
    /// annotation's `annotation.updated` snapshot — so subscribers that
    /// only care about chatter need not parse full snapshots.
    pub async fn add_thread_message(
        &self,
        annotation_id: Uuid,
        role: MessageRole,
        content: String,
    ) -> StoreResult<Annotation> {
        let mut annotation = AnnotationRepo::find_by_id(&self.pool, annotation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Annotation",
                id: annotation_id,
            })?;

        let message = ThreadMessage {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        annotation.thread.push(message.clone());
        annotation.updated_at = Some(chrono::Utc::now());
        AnnotationRepo::update(&self.pool, &annotation).await?;

        let session_id = annotation.session_id;
        self.emit_and_persist(EventKind::ThreadMessage(message), session_id)
            .await?;
        self.emit_and_persist(
            EventKind::AnnotationUpdated(annotation.clone()),
            session_id,
        )
        .await?;
        Ok(annotation)
    }

    /// Hard-delete an annotation. Emits `annotation.deleted` carrying the
    /// last known snapshot, since the object is no longer fetchable
    /// afterwards.
    pub async fn delete_annotation(&self, id: Uuid) -> StoreResult<Annotation> {
        let annotation = AnnotationRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Annotation",
                id,
            })?;

        AnnotationRepo::delete(&self.pool, id).await?;

        self.emit_and_persist(
            EventKind::AnnotationDeleted(annotation.clone()),
            annotation.session_id,
        )
        .await?;
        Ok(annotation)
    }

    /// Pending annotations for one session, oldest first.
    pub async fn get_pending_annotations(
        &self,
        session_id: Uuid,
    ) -> StoreResult<Vec<Annotation>> {
        Ok(AnnotationRepo::list_pending_by_session(&self.pool, session_id).await?)
    }

    /// Pending annotations across all sessions, oldest first.
    pub async fn get_all_pending(&self) -> StoreResult<Vec<Annotation>> {
        Ok(AnnotationRepo::list_pending_all(&self.pool).await?)
    }

    // -- Events -------------------------------------------------------------

    /// Persisted events for a session with sequence strictly greater than
    /// `after_sequence`, ascending.
    pub async fn events_since(
        &self,
        session_id: Uuid,
        after_sequence: Seq,
    ) -> StoreResult<Vec<Event>> {
        Ok(EventLogRepo::range_since(&self.pool, session_id, after_sequence).await?)
    }

    /// Persisted events across all sessions after `after_sequence`.
    pub async fn events_since_all(&self, after_sequence: Seq) -> StoreResult<Vec<Event>> {
        Ok(EventLogRepo::range_since_all(&self.pool, after_sequence).await?)
    }

    /// Lowest retained sequence, used to detect replay cursors that
    /// predate the retention window.
    pub async fn oldest_sequence(&self) -> StoreResult<Option<Seq>> {
        Ok(EventLogRepo::oldest_sequence(&self.pool).await?)
    }

    // -- Actions ------------------------------------------------------------

    /// Build an action request from the session's current annotations and
    /// emit `action.requested`.
    pub async fn record_action_request(
        &self,
        session_id: Uuid,
        output: String,
    ) -> StoreResult<ActionRequest> {
        let session = self
            .get_session_with_annotations(session_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Session",
                id: session_id,
            })?;

        let request = ActionRequest {
            session_id,
            annotations: session.annotations,
            output,
            timestamp: chrono::Utc::now(),
        };

        self.emit_and_persist(EventKind::ActionRequested(request.clone()), session_id)
            .await?;
        Ok(request)
    }
}
