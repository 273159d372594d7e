//! Answer types: provider-neutral chunk, stream and error types.
//!
//! The relay only sees [`AnswerSource`]; concrete providers live next to
//! this module and tests substitute mocks.

use std::pin::Pin;

use futures::Stream;
use wire::Citation;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by upstream answer operations.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// No answer source was configured at startup.
    #[error("answer service not configured")]
    NotConfigured,

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}: {body}")]
    ApiResponse { status: u16, body: String },

    /// A streamed event could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider did not start streaming before the request deadline.
    #[error("timed out waiting for answer stream")]
    Timeout,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// STREAM TYPES
// =============================================================================

/// One event from the upstream stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerChunk {
    /// Text fragment; may be empty.
    pub content: String,
    /// Full, ranked citation list as of this event. Empty when the event
    /// carried none.
    pub citations: Vec<Citation>,
}

/// Lazy, finite, non-restartable sequence of answer chunks. Dropping it is
/// the only way to cancel the upstream read.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerChunk, UpstreamError>> + Send>>;

// =============================================================================
// ANSWER SOURCE TRAIT
// =============================================================================

/// Provider-neutral async trait for streaming answers. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AnswerSource: Send + Sync {
    /// Open an answer stream for `query`.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] if the provider rejects the query before
    /// any event has been produced.
    async fn open_stream(&self, query: &str) -> Result<AnswerStream, UpstreamError>;
}
