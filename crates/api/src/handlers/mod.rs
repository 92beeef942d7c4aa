pub mod action;
pub mod annotation;
pub mod session;
pub mod status;

use serde::Serialize;

use margin_core::Annotation;

/// Response shape for the pending-annotation endpoints.
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub count: usize,
    pub annotations: Vec<Annotation>,
}

impl PendingResponse {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self {
            count: annotations.len(),
            annotations,
        }
    }
}
