//! Relay service: upstream answer events to newline-delimited wire records.
//!
//! DESIGN
//! ======
//! One request owns one upstream stream. Each upstream event is encoded into
//! at most two lines (citations first, then the content delta) and every line
//! is yielded as its own body frame so it is flushed before the next upstream
//! event is awaited. Errors after the first byte surface as a stream error,
//! which truncates the HTTP body; no error record is ever written to the wire.

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, warn};
use wire::{WireRecord, encode_record};

use crate::answer::{AnswerChunk, AnswerStream, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream failed mid-stream: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("wire encode failed: {0}")]
    Encode(#[from] wire::CodecError),
    #[error("request exceeded maximum duration")]
    DeadlineExceeded,
}

/// Encode one upstream event into its wire lines, in emission order.
///
/// # Errors
///
/// Returns [`RelayError::Encode`] if a record fails to serialize.
pub fn encode_chunk(chunk: AnswerChunk) -> Result<Vec<Bytes>, RelayError> {
    let mut lines = Vec::with_capacity(2);
    if !chunk.citations.is_empty() {
        let line = encode_record(&WireRecord::CitationUpdate(chunk.citations))?;
        lines.push(Bytes::from(line));
    }
    let line = encode_record(&WireRecord::ContentDelta(chunk.content))?;
    lines.push(Bytes::from(line));
    Ok(lines)
}

/// Re-serialize an upstream answer stream as wire-record lines until it ends,
/// fails, or `deadline` passes.
pub fn relay_stream(
    mut upstream: AnswerStream,
    deadline: Instant,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send {
    async_stream::try_stream! {
        let mut events: usize = 0;
        while let Some(chunk) = next_chunk(&mut upstream, deadline, events).await? {
            events += 1;
            for line in encode_chunk(chunk)? {
                yield line;
            }
        }
        debug!(events, "relay stream complete");
    }
}

async fn next_chunk(
    upstream: &mut AnswerStream,
    deadline: Instant,
    events: usize,
) -> Result<Option<AnswerChunk>, RelayError> {
    match tokio::time::timeout_at(deadline, upstream.next()).await {
        Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
        Ok(Some(Err(e))) => {
            warn!(error = %e, events, "upstream failed mid-stream; truncating response");
            Err(RelayError::Upstream(e))
        }
        Ok(None) => Ok(None),
        Err(_) => {
            warn!(events, "relay deadline exceeded; truncating response");
            Err(RelayError::DeadlineExceeded)
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
