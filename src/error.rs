//! Custom error types for the troubleshooting engine
//!
//! Each layer gets its own typed error. Only `RouterError` and `EngineError`
//! ever reach callers; provider failures are absorbed by the router.

use thiserror::Error;

use crate::constants::provider::TRANSIENT_STATUS_CODES;

/// Failure of a single provider adapter call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("permanent provider failure: {0}")]
    Permanent(String),

    #[error("unexpected response shape: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify a non-success HTTP status returned by a provider.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, truncate(body, 200));
        if TRANSIENT_STATUS_CODES.contains(&status) {
            ProviderError::Transient(message)
        } else {
            ProviderError::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return ProviderError::Transient(err.to_string());
        }
        if let Some(status) = err.status() {
            return ProviderError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() {
            return ProviderError::Parse(err.to_string());
        }
        ProviderError::Permanent(err.to_string())
    }
}

/// Router-level failure. Per-tier errors never escape; only exhaustion does.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no provider available (attempted: {attempted:?})")]
    NoProviderAvailable { attempted: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding encoder unavailable: {0}")]
    Unavailable(String),

    #[error("empty embedding returned")]
    Empty,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session store backend error: {0}")]
    Backend(String),

    #[error("failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raised by a phase executor. The engine converts it into a degraded response.
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("phase {phase} failed: {reason}")]
    Failed { phase: String, reason: String },

    #[error("phase {phase} timed out after {secs}s")]
    TimedOut { phase: String, secs: u64 },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session not found or expired: {0}")]
    SessionNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
