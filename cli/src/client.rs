//! Relay client: runs one turn against `POST /api/exaanswer`.
//!
//! DESIGN
//! ======
//! The read loop owns nothing but the response body. Each decoded record is
//! sent to the UI loop as a `TurnUpdate`; lines that fail to decode are
//! skipped. A turn ends with exactly one `Completed` or `Failed` update, or
//! with no terminal update at all when it was cancelled.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use wire::{CodecError, RecordDecoder, WireRecord};

use crate::session::{TurnEvent, TurnId, TurnRequest, TurnUpdate};

const ANSWER_PATH: &str = "/api/exaanswer";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("update receiver closed")]
    ReceiverClosed,
}

pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        let endpoint = format!("{}{ANSWER_PATH}", base_url.trim_end_matches('/'));
        Ok(Self { http, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one turn to completion, cancellation, or failure.
    pub async fn stream_turn(&self, request: TurnRequest, tx: mpsc::Sender<TurnUpdate>) {
        let TurnRequest { turn, query, cancel } = request;

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(?turn, "turn cancelled; closing stream");
                return;
            }
            outcome = self.read_stream(turn, &query, &tx) => outcome,
        };

        let event = match outcome {
            Ok(()) => TurnEvent::Completed,
            Err(ClientError::ReceiverClosed) => return,
            Err(e) => TurnEvent::Failed(e.to_string()),
        };
        if cancel.is_cancelled() {
            return;
        }
        let _ = tx.send(TurnUpdate { turn, event }).await;
    }

    async fn read_stream(&self, turn: TurnId, query: &str, tx: &mpsc::Sender<TurnUpdate>) -> Result<(), ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), message: error_message(&text) });
        }

        let mut body = response.bytes_stream();
        let mut decoder = RecordDecoder::new();
        while let Some(bytes) = body.next().await {
            let bytes = bytes?;
            for result in decoder.push(&bytes) {
                forward(turn, result, tx).await?;
            }
        }
        if decoder.pending() > 0 {
            debug!(?turn, bytes = decoder.pending(), "decoding unterminated final line");
        }
        if let Some(result) = decoder.finish() {
            forward(turn, result, tx).await?;
        }
        Ok(())
    }
}

async fn forward(
    turn: TurnId,
    result: Result<WireRecord, CodecError>,
    tx: &mpsc::Sender<TurnUpdate>,
) -> Result<(), ClientError> {
    match result {
        Ok(record) => tx
            .send(TurnUpdate { turn, event: TurnEvent::Record(record) })
            .await
            .map_err(|_| ClientError::ReceiverClosed),
        Err(e) => {
            debug!(error = %e, "skipping malformed record");
            Ok(())
        }
    }
}

/// Pull `error` out of a `{ "error": ... }` body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}
