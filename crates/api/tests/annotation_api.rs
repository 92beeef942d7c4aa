//! Integration tests for the annotation and thread endpoints.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{build_test_app, request};

async fn create_session(app: &axum::Router) -> String {
    let (status, body) = request(
        app,
        Method::POST,
        "/sessions",
        Some(json!({"url": "http://localhost:3000/"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_annotation(app: &axum::Router, session_id: &str, comment: &str) -> String {
    let (status, body) = request(
        app,
        Method::POST,
        &format!("/sessions/{session_id}/annotations"),
        Some(json!({
            "comment": comment,
            "element": "div.card",
            "elementPath": "main > div.card",
            "metadata": {"x": 51.2, "y": 300}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_annotation_on_missing_session_is_404() {
    let (app, _state) = build_test_app().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/sessions/00000000-0000-0000-0000-000000000000/annotations",
        Some(json!({
            "comment": "c", "element": "e", "elementPath": "p"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn create_annotation_with_missing_fields_is_400() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/annotations"),
        Some(json!({"comment": "only a comment"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "comment, element, and elementPath are required");
}

#[tokio::test]
async fn caller_supplied_status_is_ignored_on_create() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/annotations"),
        Some(json!({
            "comment": "sneaky",
            "element": "e",
            "elementPath": "p",
            "status": "resolved"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn patch_is_a_merge_that_returns_the_full_snapshot() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let annotation_id = create_annotation(&app, &session_id, "spacing is off").await;

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/annotations/{annotation_id}"),
        Some(json!({"severity": "suggestion"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comment"], "spacing is off");
    assert_eq!(body["severity"], "suggestion");
    assert_eq!(body["metadata"]["x"], 51.2);
}

#[tokio::test]
async fn status_lifecycle_and_terminal_idempotence() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let annotation_id = create_annotation(&app, &session_id, "fix me").await;

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/annotations/{annotation_id}"),
        Some(json!({"status": "acknowledged"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "acknowledged");

    let (_, body) = request(
        &app,
        Method::PATCH,
        &format!("/annotations/{annotation_id}"),
        Some(json!({"status": "resolved", "resolvedBy": "agent"})),
    )
    .await;
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["resolvedBy"], "agent");
    assert!(body["resolvedAt"].is_string());

    // Terminal states are final: a later dismissal is a defined no-op.
    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/annotations/{annotation_id}"),
        Some(json!({"status": "dismissed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_then_fetch_is_404() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let annotation_id = create_annotation(&app, &session_id, "temporary").await;

    let (status, body) = request(
        &app,
        Method::DELETE,
        &format!("/annotations/{annotation_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(body["annotationId"], annotation_id);

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/annotations/{annotation_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thread_messages_append_in_order() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let annotation_id = create_annotation(&app, &session_id, "what about mobile?").await;

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/annotations/{annotation_id}/thread"),
        Some(json!({"role": "agent", "content": "Looking into it."})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/annotations/{annotation_id}/thread"),
        Some(json!({"role": "human", "content": "Thanks!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let thread = body["thread"].as_array().unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["role"], "agent");
    assert_eq!(thread[1]["content"], "Thanks!");
}

#[tokio::test]
async fn thread_message_requires_role_and_content() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let annotation_id = create_annotation(&app, &session_id, "x").await;

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/annotations/{annotation_id}/thread"),
        Some(json!({"role": "agent"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "role and content are required");
}

// ---------------------------------------------------------------------------
// Pending queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_endpoints_return_count_and_fifo_annotations() {
    let (app, _state) = build_test_app().await;
    let session_id = create_session(&app).await;
    let first = create_annotation(&app, &session_id, "first").await;
    let second = create_annotation(&app, &session_id, "second").await;

    // Resolving the first leaves only the second pending.
    request(
        &app,
        Method::PATCH,
        &format!("/annotations/{first}"),
        Some(json!({"status": "resolved"})),
    )
    .await;

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/sessions/{session_id}/pending"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["annotations"][0]["id"], second);

    let (status, body) = request(&app, Method::GET, "/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}
