//! Error types shared by the API client, fetcher and deletion engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{ItemId, ItemKind};

/// Errors that can occur while talking to the provider or running a job.
#[derive(Debug, Clone, Error)]
pub enum AmnesiaError {
    /// Credentials are invalid, expired or revoked. Requires a new login.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The provider rejected the call because a rate-limit window is exhausted.
    #[error("Rate limited{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The provider returned an error response.
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// A response body could not be decoded.
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    /// An operation needs a session but nobody is logged in.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The job was cancelled before it produced a result.
    #[error("Operation cancelled")]
    Cancelled,
}

impl AmnesiaError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Http { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error invalidates the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Whether the error is a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Delay suggested by the provider before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

/// Result type for amnesia operations.
pub type Result<T> = std::result::Result<T, AmnesiaError>;

/// An item that could not be deleted and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The item that was skipped.
    pub id: ItemId,
    /// Its kind.
    pub kind: ItemKind,
    /// Human-readable reason of the last failed attempt.
    pub message: String,
    /// Number of delete attempts made.
    pub attempts: u32,
}

impl ItemFailure {
    /// Create a failure record from the last error seen for an item.
    pub fn new(id: ItemId, kind: ItemKind, error: &AmnesiaError, attempts: u32) -> Self {
        Self {
            id,
            kind,
            message: error.to_string(),
            attempts,
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {} (after {} attempt{})",
            self.kind,
            self.id,
            self.message,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AmnesiaError::RateLimited { retry_after: None }.is_retryable());
        assert!(AmnesiaError::http("connection reset").is_retryable());
        assert!(AmnesiaError::api(503, "over capacity").is_retryable());
        assert!(!AmnesiaError::api(404, "No status found").is_retryable());
        assert!(!AmnesiaError::auth("bad token").is_retryable());
        assert!(AmnesiaError::auth("bad token").is_auth());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = AmnesiaError::RateLimited {
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 42s");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(
            AmnesiaError::RateLimited { retry_after: None }.to_string(),
            "Rate limited"
        );
    }

    #[test]
    fn test_item_failure_display() {
        let failure = ItemFailure::new(
            ItemId(5),
            ItemKind::Tweet,
            &AmnesiaError::api(500, "Internal error"),
            3,
        );
        assert_eq!(
            failure.to_string(),
            "tweet 5: API error 500: Internal error (after 3 attempts)"
        );
    }
}
