//! Event distribution for the margin annotation engine.
//!
//! This crate provides the live half of the event pipeline:
//!
//! - [`EventBus`] — in-process publish/subscribe hub and the single
//!   authority for global sequence numbers. Emission is decoupled from
//!   persistence; callers persist the returned event themselves.
//! - [`delivery`] — external delivery channels (webhook fan-out).
//!
//! The bus knows nothing about storage.

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, SessionEvents};
pub use delivery::webhook::{WebhookDispatcher, WebhookError};
