//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`Event`]s and the
//! single owner of the global sequence counter. It is designed to be shared
//! via `Arc<EventBus>` across the application.
//!
//! Emission and persistence are deliberately decoupled: [`EventBus::emit`]
//! allocates the next sequence, fans the event out to live subscribers, and
//! returns it for the caller to persist. A crash between the two loses at
//! most one event rather than corrupting sequencing.

use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use margin_core::{Event, EventKind, Seq};

/// Default buffer capacity for the broadcast channel.
///
/// There is no queueing or backpressure at the bus: a subscriber that falls
/// more than this far behind observes `RecvError::Lagged` and loses the
/// overwritten events. Absorbing a burst is the subscriber's job.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process fan-out event bus and sequence authority.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every emitted [`Event`]. The sequence counter is
/// owned exclusively by the bus; there is no raw setter, only
/// [`EventBus::starting_after`] at construction and [`EventBus::emit`].
///
/// # Usage
///
/// ```rust
/// use margin_events::EventBus;
/// use margin_core::{EventKind, SyncRequired};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// let marker = SyncRequired { reason: "example".into() };
/// let event = bus.emit(EventKind::SyncRequired(marker), uuid::Uuid::new_v4());
/// assert_eq!(event.sequence, 1);
/// ```
pub struct EventBus {
    /// Last allocated sequence. Allocation and fan-out happen under this
    /// lock so dispatch order always equals emission order.
    sequence: Mutex<Seq>,
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity, counting from 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sequence: Mutex::new(0),
            sender,
        }
    }

    /// Create a bus that resumes counting above a previously persisted
    /// maximum, so sequence values are never reused across restarts.
    pub fn starting_after(last_persisted: Seq) -> Self {
        let bus = Self::new(DEFAULT_CAPACITY);
        *bus.sequence.lock().expect("sequence lock poisoned") = last_persisted;
        bus
    }

    /// Allocate the next sequence, fan the event out to all current
    /// subscribers, and return it for the caller to persist.
    ///
    /// If there are no active subscribers the live delivery is silently
    /// dropped; the returned event is still valid for persistence.
    pub fn emit(&self, kind: EventKind, session_id: Uuid) -> Event {
        let mut seq = self.sequence.lock().expect("sequence lock poisoned");
        *seq += 1;
        let event = Event {
            kind,
            session_id,
            sequence: *seq,
            timestamp: chrono::Utc::now(),
        };
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event.clone());
        event
    }

    /// The most recently allocated sequence (0 before the first emit on a
    /// fresh bus).
    pub fn current_sequence(&self) -> Seq {
        *self.sequence.lock().expect("sequence lock poisoned")
    }

    /// Subscribe to all events emitted on this bus.
    ///
    /// The returned receiver is the subscription handle; dropping it is the
    /// (idempotent) unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to events for a single session.
    pub fn subscribe_to_session(&self, session_id: Uuid) -> SessionEvents {
        SessionEvents {
            session_id,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// SessionEvents
// ---------------------------------------------------------------------------

/// A bus subscription filtered to one session.
///
/// Events for other sessions are consumed and discarded, so within the
/// session the observed order is the global emission order.
pub struct SessionEvents {
    session_id: Uuid,
    receiver: broadcast::Receiver<Event>,
}

impl SessionEvents {
    /// Receive the next event for the subscribed session.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if event.session_id == self.session_id {
                return Ok(event);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
