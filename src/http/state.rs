//! Shared handler state.

use std::sync::Arc;

use crate::application::Pipeline;

/// State passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Upload and export coordinator.
    pub pipeline: Arc<Pipeline>,
    /// Upload ceiling, used to size the request body limit.
    pub max_upload_bytes: u64,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: Pipeline, max_upload_bytes: u64) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_upload_bytes,
        }
    }
}
