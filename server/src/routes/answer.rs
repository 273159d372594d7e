//! Answer relay route.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderName};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::answer::UpstreamError;
use crate::services::relay::relay_stream;
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Failures reported before any body byte is written.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("query is required")]
    InvalidRequest,
    #[error("Failed to perform search | {0}")]
    Upstream(#[from] UpstreamError),
}

pub(crate) fn answer_error_to_status(err: &AnswerError) -> StatusCode {
    match err {
        AnswerError::InvalidRequest => StatusCode::BAD_REQUEST,
        AnswerError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AnswerError {
    fn into_response(self) -> Response {
        let status = answer_error_to_status(&self);
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// `POST /api/exaanswer`: stream an answer as newline-delimited wire records.
pub async fn answer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AnswerError> {
    let deadline = Instant::now() + state.max_duration;
    let query = validate_query(&body)?;

    let Some(source) = state.answers.as_ref() else {
        warn!("answer request received but upstream is not configured");
        return Err(UpstreamError::NotConfigured.into());
    };

    let upstream = match tokio::time::timeout_at(deadline, source.open_stream(&query)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(error = %e, "upstream rejected answer request");
            return Err(e.into());
        }
        Err(_) => {
            warn!("upstream did not start streaming before deadline");
            return Err(UpstreamError::Timeout.into());
        }
    };

    info!(query_len = query.len(), "relay stream opened");
    let headers = [
        (CONTENT_TYPE, "text/event-stream"),
        (CACHE_CONTROL, "no-cache"),
        (CONNECTION, "keep-alive"),
        (X_ACCEL_BUFFERING, "no"),
    ];
    Ok((headers, Body::from_stream(relay_stream(upstream, deadline))).into_response())
}

/// Extract a non-empty query from a JSON body, whatever its content type.
/// Every malformed body is a client error.
fn validate_query(body: &[u8]) -> Result<String, AnswerError> {
    match serde_json::from_slice::<AnswerBody>(body) {
        Ok(AnswerBody { query: Some(query) }) if !query.is_empty() => Ok(query),
        Ok(_) => Err(AnswerError::InvalidRequest),
        Err(e) => {
            debug!(error = %e, "answer body rejected");
            Err(AnswerError::InvalidRequest)
        }
    }
}

#[cfg(test)]
#[path = "answer_test.rs"]
mod tests;
