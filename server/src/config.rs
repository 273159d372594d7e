//! Server configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
/// Upper bound on one relay request, including the streamed body.
pub const DEFAULT_RELAY_MAX_DURATION_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub max_duration: Duration,
}

impl ServerConfig {
    /// Build server config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `RELAY_MAX_DURATION_SECS`: default 60, must be non-zero
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let max_duration_secs = match std::env::var("RELAY_MAX_DURATION_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::Invalid { var: "RELAY_MAX_DURATION_SECS", value: raw }),
            },
            Err(_) => DEFAULT_RELAY_MAX_DURATION_SECS,
        };

        Ok(Self { port, max_duration: Duration::from_secs(max_duration_secs) })
    }
}

pub(crate) fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
