//! SSE stream handlers.
//!
//! Each connection follows the same shape: an immediate comment line (so
//! buffering proxies flush the response head), replay of persisted events
//! past the client's `Last-Event-ID` cursor, then live delivery from the
//! bus. Replay completes before the live subscription is taken; an event
//! emitted exactly between the two can be missed once and is recovered by
//! the client's next reconnect through the same cursor mechanism.
//!
//! Frames are `event:` / `id:` / `data:` lines terminated by a blank line;
//! clients track `id:` (the global sequence) as their reconnect cursor. A
//! keepalive comment every 30 seconds defeats idle-timeout disconnects.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use margin_core::{CoreError, Event, EventKind, Seq, SyncRequired, SYNC_SEQUENCE};
use margin_events::SessionEvents;
use margin_store::AnnotationStore;

use crate::error::{AppError, AppResult};
use crate::sse::{ConnectionGuard, ConnectionKind};
use crate::state::AppState;

/// Interval between keepalive comments.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/* --------------------------------------------------------------------------
   Query parameters
   -------------------------------------------------------------------------- */

/// Query parameters shared by both stream endpoints.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Marks the connection as an agent consumer for delivery accounting.
    #[serde(default)]
    pub agent: bool,
    /// Domain filter for the site-wide stream (e.g. `localhost:3000`).
    pub domain: Option<String>,
}

impl StreamQuery {
    fn connection_kind(&self) -> ConnectionKind {
        if self.agent {
            ConnectionKind::Agent
        } else {
            ConnectionKind::Browser
        }
    }
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// GET /sessions/{id}/events
///
/// SSE stream of one session's events, with `Last-Event-ID` replay.
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    if state.store.get_session(session_id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Session",
            id: session_id,
        }));
    }

    let mut replay: Vec<SseEvent> = Vec::new();
    if let Some(cursor) = last_event_id(&headers) {
        if replay_window_expired(&state, cursor).await? {
            replay.push(sse_frame(&sync_marker(session_id)));
        }
        for event in state.store.events_since(session_id, cursor).await? {
            replay.push(sse_frame(&event));
        }
    }

    // Subscribe only after replay is assembled, so replayed and live
    // delivery cannot interleave out of order.
    let subscription = state.store.bus().subscribe_to_session(session_id);
    let guard = state.registry.register(query.connection_kind());

    let stream = stream::once(async { SseEvent::default().comment("connected") })
        .chain(stream::iter(replay))
        .chain(session_live_stream(subscription, guard))
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(keepalive()))
}

/// GET /events
///
/// Site-wide SSE stream, optionally filtered to one domain (the host of
/// each event's session URL). Useful for agents tracking feedback across
/// page navigations.
pub async fn domain_events(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let domain = query.domain.clone();

    let mut replay: Vec<SseEvent> = Vec::new();
    if let Some(cursor) = last_event_id(&headers) {
        if replay_window_expired(&state, cursor).await? {
            replay.push(sse_frame(&sync_marker(Uuid::nil())));
        }

        let mut events = state.store.events_since_all(cursor).await?;
        if let Some(domain) = &domain {
            let matching: HashSet<Uuid> = state
                .store
                .list_sessions()
                .await?
                .into_iter()
                .filter(|s| host_of(&s.url) == Some(domain.as_str()))
                .map(|s| s.id)
                .collect();
            events.retain(|e| matching.contains(&e.session_id));
        }
        replay.extend(events.iter().map(sse_frame));
    }

    let receiver = state.store.bus().subscribe();
    let guard = state.registry.register(query.connection_kind());

    let comment = match &domain {
        Some(domain) => format!("connected to domain {domain}"),
        None => "connected".to_string(),
    };

    let stream = stream::once(async move { SseEvent::default().comment(comment) })
        .chain(stream::iter(replay))
        .chain(domain_live_stream(
            receiver,
            Arc::clone(&state.store),
            domain,
            guard,
        ))
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(keepalive()))
}

/* --------------------------------------------------------------------------
   Stream plumbing
   -------------------------------------------------------------------------- */

/// Turn a session-scoped bus subscription into a frame stream.
///
/// The connection guard rides along in the stream state: when the client
/// disconnects the stream is dropped, which drops the guard (deregistering
/// the connection) and the subscription (unsubscribing from the bus) in
/// the same moment.
fn session_live_stream(
    subscription: SessionEvents,
    guard: ConnectionGuard,
) -> impl Stream<Item = SseEvent> {
    stream::unfold(
        (subscription, guard),
        |(mut subscription, guard)| async move {
            loop {
                match subscription.recv().await {
                    Ok(event) => return Some((sse_frame(&event), (subscription, guard))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The client self-heals via its reconnect cursor.
                        tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    )
}

/// Turn a global bus subscription into a frame stream, optionally
/// narrowed to sessions whose URL host matches `domain`. Sessions are
/// looked up per event so pages visited after connect are included.
fn domain_live_stream(
    receiver: broadcast::Receiver<Event>,
    store: Arc<AnnotationStore>,
    domain: Option<String>,
    guard: ConnectionGuard,
) -> impl Stream<Item = SseEvent> {
    stream::unfold(
        (receiver, store, domain, guard),
        |(mut receiver, store, domain, guard)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if in_domain(&store, domain.as_deref(), &event).await {
                            return Some((sse_frame(&event), (receiver, store, domain, guard)));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    )
}

/// Whether an event's session belongs to the requested domain.
async fn in_domain(store: &Arc<AnnotationStore>, domain: Option<&str>, event: &Event) -> bool {
    let Some(domain) = domain else {
        return true;
    };
    match store.get_session(event.session_id).await {
        Ok(Some(session)) => host_of(&session.url) == Some(domain),
        // Unknown or unreadable session: not part of this domain.
        _ => false,
    }
}

/// Frame an event as `event:` / `id:` / `data:` lines.
fn sse_frame(event: &Event) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize event for SSE");
        "{}".to_string()
    });
    SseEvent::default()
        .event(event.kind.type_name())
        .id(event.sequence.to_string())
        .data(data)
}

fn keepalive() -> KeepAlive {
    KeepAlive::new().interval(KEEPALIVE_INTERVAL).text("ping")
}

/// Parse the client's replay cursor from the `Last-Event-ID` header.
fn last_event_id(headers: &HeaderMap) -> Option<Seq> {
    headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Seq>().ok())
}

/// Whether a reconnect cursor predates the retained event window. When it
/// does, the client gets an explicit `sync.required` marker instead of a
/// quietly gappy stream.
async fn replay_window_expired(state: &AppState, cursor: Seq) -> AppResult<bool> {
    let oldest = state.store.oldest_sequence().await?;
    Ok(matches!(oldest, Some(oldest) if cursor + 1 < oldest))
}

/// Synthetic sequence-0 event telling the client to refetch full state.
fn sync_marker(session_id: Uuid) -> Event {
    Event {
        kind: EventKind::SyncRequired(SyncRequired {
            reason: "replay window expired; refetch full state".to_string(),
        }),
        session_id,
        sequence: SYNC_SEQUENCE,
        timestamp: chrono::Utc::now(),
    }
}

/// Extract the host (including port) from a URL, the way the browser's
/// `URL.host` reports it.
fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let host = &rest[..end];
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/* --------------------------------------------------------------------------
   Tests
   -------------------------------------------------------------------------- */
