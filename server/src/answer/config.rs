//! Answer provider configuration parsed from environment variables.

use super::types::UpstreamError;
use crate::config::env_parse_u64;

pub const DEFAULT_EXA_BASE_URL: &str = "https://api.exa.ai";
pub const DEFAULT_EXA_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_EXA_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeouts: AnswerTimeouts,
}

impl AnswerConfig {
    /// Build typed answer config from environment variables.
    ///
    /// Required:
    /// - `EXA_API_KEY`
    ///
    /// Optional:
    /// - `EXA_BASE_URL`: default `https://api.exa.ai`
    /// - `EXA_REQUEST_TIMEOUT_SECS`: default 60
    /// - `EXA_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::MissingApiKey`] when the key is unset or blank,
    /// and [`UpstreamError::ConfigParse`] for a base URL without a scheme.
    pub fn from_env() -> Result<Self, UpstreamError> {
        let api_key = std::env::var("EXA_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| UpstreamError::MissingApiKey { var: "EXA_API_KEY".into() })?;

        let base_url = parse_base_url(std::env::var("EXA_BASE_URL").ok().as_deref())?;
        let timeouts = AnswerTimeouts {
            request_secs: env_parse_u64("EXA_REQUEST_TIMEOUT_SECS", DEFAULT_EXA_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("EXA_CONNECT_TIMEOUT_SECS", DEFAULT_EXA_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_key, base_url, timeouts })
    }
}

fn parse_base_url(raw: Option<&str>) -> Result<String, UpstreamError> {
    let url = raw.unwrap_or(DEFAULT_EXA_BASE_URL).trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(UpstreamError::ConfigParse(format!("EXA_BASE_URL must be an http(s) URL, got '{url}'")));
    }
    Ok(url.to_string())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
