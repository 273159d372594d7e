//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the relay endpoint and a health probe under a single
//! Axum router. Page chrome, redirects and static assets are served by an
//! external front-end and are not routed here.

pub mod answer;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Relay API routes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/exaanswer", post(answer::answer))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
