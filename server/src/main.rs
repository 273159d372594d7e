mod answer;
mod config;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::answer::{AnswerClient, AnswerSource};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }

    let config = config::ServerConfig::from_env().expect("invalid server configuration");

    // Non-fatal: relay answers 500 until the upstream is configured.
    let answers: Option<Arc<dyn AnswerSource>> = match AnswerClient::from_env() {
        Ok(client) => {
            tracing::info!(base_url = client.base_url(), "answer client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "answer client not configured; relay requests will fail");
            None
        }
    };

    let state = state::AppState::new(answers, config.max_duration);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, max_duration_secs = config.max_duration.as_secs(), "answer relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
