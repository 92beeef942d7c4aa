//! Session/annotation store: the single mutation path of the engine.
//!
//! Every mutation goes through [`AnnotationStore`], which pairs the
//! database write with exactly one bus emission and one event-log append,
//! so emission order always equals mutation order.

mod store;

pub use store::{AnnotationStore, StoreError, StoreResult};
