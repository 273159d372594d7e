//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only immutable, request-independent handles: the upstream answer
//! source and the per-request deadline. Each relay request owns its own
//! stream and encoder, so nothing here is mutated after startup.

use std::sync::Arc;
use std::time::Duration;

use crate::answer::AnswerSource;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the upstream is not configured; requests then fail with 500.
    pub answers: Option<Arc<dyn AnswerSource>>,
    pub max_duration: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(answers: Option<Arc<dyn AnswerSource>>, max_duration: Duration) -> Self {
        Self { answers, max_duration }
    }
}
