//! Exa `/answer` streaming client.
//!
//! Thin HTTP wrapper for `POST /answer` with `stream: true`. The response body
//! is SSE-framed; `ExaStreamState` is the pure incremental parser so event
//! splitting can be tested without a network.

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use wire::Citation;

use super::config::AnswerTimeouts;
use super::types::{AnswerChunk, AnswerStream, UpstreamError};

const ANSWER_PATH: &str = "/answer";
/// Answer-quality tier. Fixed; never taken from the caller.
const ANSWER_MODEL: &str = "exa-pro";

// =============================================================================
// CLIENT
// =============================================================================

pub struct ExaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExaClient {
    /// Build a client with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::HttpClientBuild`] if the TLS backend fails to
    /// initialise.
    pub fn new(api_key: String, base_url: String, timeouts: AnswerTimeouts) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| UpstreamError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url })
    }

    /// Send the query and return the event stream once response headers
    /// arrive. Failures up to that point are reported before streaming.
    pub async fn stream_answer(&self, query: &str) -> Result<AnswerStream, UpstreamError> {
        let body = ApiRequest { query, stream: true, text: false, model: ANSWER_MODEL };
        let url = format!("{}{}", self.base_url, ANSWER_PATH);

        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ApiResponse { status: status.as_u16(), body: text });
        }

        Ok(Box::pin(event_stream(response)))
    }
}

fn event_stream(response: reqwest::Response) -> impl Stream<Item = Result<AnswerChunk, UpstreamError>> + Send {
    try_stream! {
        let mut body = response.bytes_stream();
        let mut state = ExaStreamState::default();

        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| UpstreamError::ApiRequest(e.to_string()))?;
            for chunk in state.push_bytes(&bytes)? {
                yield chunk;
            }
            if state.is_done() {
                break;
            }
        }

        if let Some(chunk) = state.finish()? {
            yield chunk;
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    query: &'a str,
    stream: bool,
    text: bool,
    model: &'a str,
}

#[derive(Deserialize)]
struct ApiEvent {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    citations: Option<Vec<ApiCitation>>,
}

#[derive(Deserialize)]
struct ApiChoice {
    #[serde(default)]
    delta: ApiDelta,
}

#[derive(Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCitation {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    favicon: Option<String>,
}

impl From<ApiCitation> for Citation {
    fn from(c: ApiCitation) -> Self {
        Self {
            id: c.id.unwrap_or_else(|| c.url.clone()),
            url: c.url,
            title: c.title.unwrap_or_default(),
            author: c.author.filter(|a| !a.is_empty()),
            published_date: c.published_date.filter(|d| !d.is_empty()),
            snippet: c.text.unwrap_or_default(),
            favicon: c.favicon,
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Incremental SSE parser for the Exa answer stream.
#[derive(Debug, Default)]
pub(crate) struct ExaStreamState {
    buffer: Vec<u8>,
    done: bool,
}

impl ExaStreamState {
    /// Append bytes and return the chunks of every event they complete.
    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Result<Vec<AnswerChunk>, UpstreamError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some((split, delimiter_len)) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..split + delimiter_len).collect();
            if let Some(chunk) = self.process_event(&event[..split])? {
                chunks.push(chunk);
            }
            if self.done {
                break;
            }
        }
        Ok(chunks)
    }

    /// Flush a final event that was not followed by a blank line.
    pub(crate) fn finish(&mut self) -> Result<Option<AnswerChunk>, UpstreamError> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        self.process_event(&rest)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    fn process_event(&mut self, raw: &[u8]) -> Result<Option<AnswerChunk>, UpstreamError> {
        let event = std::str::from_utf8(raw).map_err(|e| UpstreamError::ApiParse(e.to_string()))?;
        let Some(payload) = extract_data_payload(event) else {
            return Ok(None);
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(None);
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }
        parse_event(payload)
    }
}

/// Position and length of the first blank-line event delimiter.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find_subslice(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find_subslice(buffer, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Join the `data:` lines of one event. Comments and other fields are ignored.
fn extract_data_payload(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();
    if data.is_empty() { None } else { Some(data.join("\n")) }
}

fn parse_event(payload: &str) -> Result<Option<AnswerChunk>, UpstreamError> {
    let event: ApiEvent = serde_json::from_str(payload).map_err(|e| UpstreamError::ApiParse(e.to_string()))?;

    let content = event
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content);

    if content.is_none() && event.citations.is_none() {
        return Ok(None);
    }

    Ok(Some(AnswerChunk {
        content: content.unwrap_or_default(),
        citations: event
            .citations
            .unwrap_or_default()
            .into_iter()
            .map(Citation::from)
            .collect(),
    }))
}

#[cfg(test)]
#[path = "exa_test.rs"]
mod tests;
