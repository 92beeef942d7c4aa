//! Core domain types for the margin annotation engine.
//!
//! This crate defines the entities shared by every other layer:
//!
//! - [`Session`] / [`Annotation`] / [`ThreadMessage`] — the annotation
//!   domain model and its status state machines.
//! - [`Event`] — the immutable, sequence-numbered envelope used for both
//!   durable persistence and live fan-out, with a payload union keyed by
//!   event type.
//! - [`ActionRequest`] — the "send to agent" payload delivered over SSE
//!   and webhooks.
//! - [`CoreError`] — the domain error taxonomy.
//!
//! It is deliberately free of storage and transport concerns.

pub mod action;
pub mod annotation;
pub mod error;
pub mod event;
pub mod session;
pub mod types;

pub use action::ActionRequest;
pub use annotation::{
    Annotation, AnnotationPatch, AnnotationStatus, MessageRole, NewAnnotation, ThreadMessage,
};
pub use error::CoreError;
pub use event::{Event, EventKind, SyncRequired, SYNC_SEQUENCE};
pub use session::{Session, SessionStatus, SessionWithAnnotations};
pub use types::{Seq, Timestamp};
