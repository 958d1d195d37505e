//! Error types for price fetching.

use alertbot_core::Symbol;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching prices.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::ConnectionFailed(_) | FeedError::Timeout(_) | FeedError::RateLimitExceeded => true,
            FeedError::Http { status, .. } => *status >= 500,
            FeedError::ParseError(_) | FeedError::UnknownSymbol(_) => false,
        }
    }

    /// Returns true if retrying cannot help.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FeedError::UnknownSymbol(_))
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    /// Returns None for errors that should not be retried.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimitExceeded => Some(Duration::from_secs(60)),
            FeedError::ConnectionFailed(_) => Some(Duration::from_secs(5)),
            FeedError::Timeout(_) => Some(Duration::from_secs(2)),
            FeedError::Http { status, .. } if *status >= 500 => Some(Duration::from_secs(5)),
            FeedError::Http { .. } | FeedError::ParseError(_) | FeedError::UnknownSymbol(_) => None,
        }
    }
}
