//! Answer: upstream streaming question-answering capability.
//!
//! DESIGN
//! ======
//! Configured from environment variables. `AnswerClient` wraps the Exa
//! client behind the [`AnswerSource`] trait so the relay route never depends
//! on a concrete provider and tests can swap in a mock.

pub mod config;
pub mod exa;
pub mod types;

use config::AnswerConfig;
pub use types::{AnswerChunk, AnswerSource, AnswerStream, UpstreamError};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete answer client backed by the Exa `/answer` endpoint.
pub struct AnswerClient {
    inner: exa::ExaClient,
    base_url: String,
}

impl AnswerClient {
    /// Build an answer client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, UpstreamError> {
        let config = AnswerConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an answer client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: AnswerConfig) -> Result<Self, UpstreamError> {
        let base_url = config.base_url.clone();
        let inner = exa::ExaClient::new(config.api_key, config.base_url, config.timeouts)?;
        Ok(Self { inner, base_url })
    }

    /// Return the configured upstream base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl AnswerSource for AnswerClient {
    async fn open_stream(&self, query: &str) -> Result<AnswerStream, UpstreamError> {
        self.inner.stream_answer(query).await
    }
}
