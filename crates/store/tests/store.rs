//! Behavioural tests for `AnnotationStore`.
//!
//! These exercise the store against an in-memory SQLite database and a
//! live event bus — the same wiring the server uses, minus HTTP.

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use margin_core::{
    AnnotationPatch, AnnotationStatus, CoreError, EventKind, MessageRole, NewAnnotation, Seq,
};
use margin_db::repositories::EventLogRepo;
use margin_events::EventBus;
use margin_store::{AnnotationStore, StoreError};

async fn test_store() -> AnnotationStore {
    let pool = margin_db::create_pool("sqlite::memory:")
        .await
        .expect("in-memory pool");
    margin_db::init_schema(&pool).await.expect("schema");
    AnnotationStore::new(pool, Arc::new(EventBus::default()))
}

fn feedback(comment: &str) -> NewAnnotation {
    NewAnnotation {
        comment: comment.to_string(),
        element: "button.submit".to_string(),
        element_path: "main > form > button".to_string(),
        metadata: serde_json::json!({"x": 42.0, "y": 180}),
        intent: Some("fix".to_string()),
        severity: None,
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_session_starts_active_and_emits() {
    let store = test_store().await;

    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .expect("create");

    assert_eq!(session.status, margin_core::SessionStatus::Active);

    let events = store.events_since(session.id, 0).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_matches!(events[0].kind, EventKind::SessionCreated(_));
    assert_eq!(events[0].sequence, 1);
}

#[tokio::test]
async fn closing_a_session_emits_session_closed() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();

    store
        .update_session_status(session.id, margin_core::SessionStatus::Closed)
        .await
        .unwrap();

    let events = store.events_since(session.id, 0).await.unwrap();
    assert_matches!(events.last().unwrap().kind, EventKind::SessionClosed(_));
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_annotation_to_missing_session_is_not_found() {
    let store = test_store().await;

    let err = store
        .add_annotation(Uuid::new_v4(), feedback("orphan"))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        StoreError::Core(CoreError::NotFound {
            entity: "Session",
            ..
        })
    );
}

#[tokio::test]
async fn new_annotations_are_always_pending() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();

    let annotation = store
        .add_annotation(session.id, feedback("misaligned"))
        .await
        .unwrap();

    assert_eq!(annotation.status, AnnotationStatus::Pending);
    assert!(annotation.thread.is_empty());
}

#[tokio::test]
async fn update_is_a_merge_patch_with_full_snapshot_event() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("typo in heading"))
        .await
        .unwrap();

    let updated = store
        .update_annotation(
            annotation.id,
            AnnotationPatch {
                severity: Some("suggestion".to_string()),
                ..AnnotationPatch::default()
            },
        )
        .await
        .unwrap();

    // Untouched fields survive the patch.
    assert_eq!(updated.comment, "typo in heading");
    assert_eq!(updated.severity.as_deref(), Some("suggestion"));
    assert_eq!(updated.intent.as_deref(), Some("fix"));

    let events = store.events_since(session.id, 0).await.unwrap();
    let last = events.last().unwrap();
    assert_matches!(&last.kind, EventKind::AnnotationUpdated(a) => {
        assert_eq!(a.severity.as_deref(), Some("suggestion"));
        assert_eq!(a.comment, "typo in heading");
    });
}

#[tokio::test]
async fn terminal_status_is_idempotent_and_stamped_by_the_store() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("broken link"))
        .await
        .unwrap();

    let resolved = store
        .update_annotation_status(annotation.id, AnnotationStatus::Resolved, None)
        .await
        .unwrap();
    assert_eq!(resolved.status, AnnotationStatus::Resolved);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.resolved_by, Some(MessageRole::Agent));

    let events_after_resolve = store.events_since(session.id, 0).await.unwrap().len();

    // Further terminal transitions are defined no-ops: state unchanged,
    // no new event.
    let again = store
        .update_annotation_status(
            annotation.id,
            AnnotationStatus::Dismissed,
            Some(MessageRole::Human),
        )
        .await
        .unwrap();
    assert_eq!(again.status, AnnotationStatus::Resolved);
    assert_eq!(again.resolved_at, resolved.resolved_at);
    assert_eq!(again.resolved_by, Some(MessageRole::Agent));

    let events_after_retry = store.events_since(session.id, 0).await.unwrap().len();
    assert_eq!(events_after_retry, events_after_resolve);
}

#[tokio::test]
async fn backward_status_transitions_are_noops() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("contrast too low"))
        .await
        .unwrap();

    store
        .update_annotation_status(annotation.id, AnnotationStatus::Acknowledged, None)
        .await
        .unwrap();

    let back = store
        .update_annotation_status(annotation.id, AnnotationStatus::Pending, None)
        .await
        .unwrap();
    assert_eq!(back.status, AnnotationStatus::Acknowledged);
}

#[tokio::test]
async fn thread_append_emits_message_then_snapshot() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("what font is this?"))
        .await
        .unwrap();

    store
        .add_thread_message(
            annotation.id,
            MessageRole::Agent,
            "It's the system stack.".to_string(),
        )
        .await
        .unwrap();

    let events = store.events_since(session.id, 0).await.unwrap();
    let n = events.len();
    assert_matches!(&events[n - 2].kind, EventKind::ThreadMessage(m) => {
        assert_eq!(m.content, "It's the system stack.");
        assert_eq!(m.role, MessageRole::Agent);
    });
    assert_matches!(&events[n - 1].kind, EventKind::AnnotationUpdated(a) => {
        assert_eq!(a.thread.len(), 1);
    });
}

#[tokio::test]
async fn delete_emits_the_last_snapshot_and_removes_the_row() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("obsolete note"))
        .await
        .unwrap();

    let deleted = store.delete_annotation(annotation.id).await.unwrap();
    assert_eq!(deleted.id, annotation.id);

    assert!(store.get_annotation(annotation.id).await.unwrap().is_none());

    let events = store.events_since(session.id, 0).await.unwrap();
    assert_matches!(&events.last().unwrap().kind, EventKind::AnnotationDeleted(a) => {
        assert_eq!(a.comment, "obsolete note");
    });

    // Deleting again reports NotFound.
    let err = store.delete_annotation(annotation.id).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn pending_queries_are_fifo_by_creation_time() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();

    let first = store
        .add_annotation(session.id, feedback("first"))
        .await
        .unwrap();
    let second = store
        .add_annotation(session.id, feedback("second"))
        .await
        .unwrap();
    let third = store
        .add_annotation(session.id, feedback("third"))
        .await
        .unwrap();

    // Resolving one removes it from the pending set without reordering
    // the rest.
    store
        .update_annotation_status(second.id, AnnotationStatus::Resolved, None)
        .await
        .unwrap();

    let pending = store.get_pending_annotations(session.id).await.unwrap();
    let ids: Vec<Uuid> = pending.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);

    let all_pending = store.get_all_pending().await.unwrap();
    assert_eq!(all_pending.len(), 2);
}

// ---------------------------------------------------------------------------
// Sequencing and replay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequences_are_gapless_across_mixed_operations() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("check spacing"))
        .await
        .unwrap();
    store
        .update_annotation_status(annotation.id, AnnotationStatus::Acknowledged, None)
        .await
        .unwrap();
    store
        .add_thread_message(annotation.id, MessageRole::Human, "ping".to_string())
        .await
        .unwrap();

    // session.created, annotation.created, annotation.updated,
    // thread.message, annotation.updated
    let events = store.events_since(session.id, 0).await.unwrap();
    let sequences: Vec<Seq> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    // Replay from every cursor returns exactly the tail.
    for cursor in 0..=5 {
        let tail = store.events_since(session.id, cursor).await.unwrap();
        let got: Vec<Seq> = tail.iter().map(|e| e.sequence).collect();
        let expected: Vec<Seq> = ((cursor + 1)..=5).collect();
        assert_eq!(got, expected, "cursor {cursor}");
    }
}

#[tokio::test]
async fn restart_resumes_sequencing_above_the_persisted_max() {
    let pool = margin_db::create_pool("sqlite::memory:").await.unwrap();
    margin_db::init_schema(&pool).await.unwrap();

    let store = AnnotationStore::new(pool.clone(), Arc::new(EventBus::default()));
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    store
        .add_annotation(session.id, feedback("pre-restart"))
        .await
        .unwrap();

    // Simulate a restart: a fresh bus seeded from the log's maximum, over
    // the same database.
    let max = EventLogRepo::max_sequence(&pool).await.unwrap().unwrap_or(0);
    assert_eq!(max, 2);
    let restarted = AnnotationStore::new(pool, Arc::new(EventBus::starting_after(max)));

    let annotation = restarted
        .add_annotation(session.id, feedback("post-restart"))
        .await
        .unwrap();
    let events = restarted.events_since(session.id, max).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sequence, 3);
    assert_matches!(&events[0].kind, EventKind::AnnotationCreated(a) => {
        assert_eq!(a.id, annotation.id);
    });
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn action_request_snapshots_all_session_annotations() {
    let store = test_store().await;
    let session = store
        .create_session("http://localhost:3000/".to_string(), None, None)
        .await
        .unwrap();
    store
        .add_annotation(session.id, feedback("a"))
        .await
        .unwrap();
    store
        .add_annotation(session.id, feedback("b"))
        .await
        .unwrap();

    let request = store
        .record_action_request(session.id, "## Feedback\n- a\n- b\n".to_string())
        .await
        .unwrap();

    assert_eq!(request.annotations.len(), 2);
    assert_eq!(request.output, "## Feedback\n- a\n- b\n");

    let events = store.events_since(session.id, 0).await.unwrap();
    assert_matches!(&events.last().unwrap().kind, EventKind::ActionRequested(r) => {
        assert_eq!(r.annotations.len(), 2);
    });
}

// ---------------------------------------------------------------------------
// The full agent loop scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_with_summary_scenario() {
    let store = test_store().await;

    let session = store
        .create_session("http://localhost:3000/pricing".to_string(), None, None)
        .await
        .unwrap();
    let annotation = store
        .add_annotation(session.id, feedback("padding looks off"))
        .await
        .unwrap();

    // The agent sees exactly one pending annotation.
    let pending = store.get_pending_annotations(session.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, annotation.id);

    // Acknowledge, then resolve with a summary reply.
    store
        .update_annotation_status(annotation.id, AnnotationStatus::Acknowledged, None)
        .await
        .unwrap();
    store
        .update_annotation_status(annotation.id, AnnotationStatus::Resolved, None)
        .await
        .unwrap();
    let resolved = store
        .add_thread_message(
            annotation.id,
            MessageRole::Agent,
            "Resolved: fixed padding".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(resolved.status, AnnotationStatus::Resolved);
    assert_eq!(resolved.thread.len(), 1);
    assert_eq!(resolved.thread[0].content, "Resolved: fixed padding");
    assert_eq!(resolved.thread[0].role, MessageRole::Agent);

    // Nothing left to triage.
    assert!(store
        .get_pending_annotations(session.id)
        .await
        .unwrap()
        .is_empty());
}
