//! Error types for wattboard-core.
//!
//! # Error Categories
//!
//! The controller never retries on its own; the category only tells the view
//! layer what to offer the operator.
//!
//! | Error Type | Category | View-layer reaction |
//! |------------|----------|---------------------|
//! | [`Error::Transport`] | retryable | Show message, offer retry, keep previous data |
//! | [`Error::Timeout`] | retryable | Same as transport |
//! | [`Error::Api`] with 5xx | retryable | Same as transport |
//! | [`Error::Api`] with 4xx | not retryable | Show message |
//! | [`Error::Unauthorized`] | authorization | Trigger re-authentication |
//! | [`Error::Decode`] | not retryable | Payload did not match the expected rows |
//! | [`Error::InvalidFilter`] | not retryable | Reject the input, keep the selection |
//! | [`Error::InvalidConfig`] | not retryable | Fix configuration and restart |
//!
//! A missing institution is not an error at all: `sync` simply does nothing.
//! An empty result list is not an error either; it is reported through
//! [`crate::SyncStatus::Empty`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors produced while fetching or decoding dashboard data.
///
/// Errors are stored in controller state and broadcast in events, so this
/// type is `Clone` and carries messages rather than source errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The backend could not be reached.
    #[error("Service not reachable at {url}: {message}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// Description of the network failure.
        message: String,
    },

    /// The backend rejected the credentials (HTTP 401 or 403).
    #[error("Not authorized (HTTP {status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Message reported by the backend.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the backend.
        message: String,
    },

    /// The payload could not be decoded into the expected rows.
    #[error("Invalid response payload: {0}")]
    Decode(String),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A filter value was rejected before any request was made.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`Error`] for the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network-level failure or timeout; retrying may help.
    Network,
    /// Credentials rejected; re-authentication required.
    Authorization,
    /// Backend reported an error status.
    Server,
    /// Payload shape mismatch.
    Payload,
    /// Rejected operator input.
    Input,
    /// Local configuration problem.
    Configuration,
}

impl Error {
    /// Create a transport error for `url`.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an error from an HTTP status, routing 401/403 to
    /// [`Error::Unauthorized`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            _ => Self::Api { status, message },
        }
    }

    /// Create a filter validation error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } | Error::Timeout(_) => ErrorKind::Network,
            Error::Unauthorized { .. } => ErrorKind::Authorization,
            Error::Api { .. } => ErrorKind::Server,
            Error::Decode(_) => ErrorKind::Payload,
            Error::InvalidFilter(_) => ErrorKind::Input,
            Error::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }

    /// Whether re-issuing the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Timeout(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the view layer should trigger re-authentication.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// HTTP status code, when the error came from an HTTP response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { status, .. } | Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Result type alias using wattboard-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport("http://localhost/api/devices", "connection refused");
        assert!(err.to_string().contains("http://localhost/api/devices"));
        assert!(err.to_string().contains("connection refused"));

        let err = Error::Timeout(Duration::from_secs(15));
        assert!(err.to_string().contains("15s"));

        let err = Error::Decode("missing field `date`".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid response payload: missing field `date`"
        );
    }

    #[test]
    fn test_from_status_routes_auth_failures() {
        assert!(Error::from_status(401, "expired").is_authorization());
        assert!(Error::from_status(403, "forbidden").is_authorization());
        assert!(!Error::from_status(404, "missing").is_authorization());
        assert_eq!(Error::from_status(404, "missing").status(), Some(404));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::transport("u", "reset").is_retryable());
        assert!(Error::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(Error::from_status(503, "unavailable").is_retryable());
        assert!(Error::from_status(429, "slow down").is_retryable());
        assert!(!Error::from_status(400, "bad request").is_retryable());
        assert!(!Error::from_status(401, "expired").is_retryable());
        assert!(!Error::Decode("x".into()).is_retryable());
    }

    #[test]
    fn test_kind() {
        assert_eq!(Error::transport("u", "m").kind(), ErrorKind::Network);
        assert_eq!(Error::from_status(401, "m").kind(), ErrorKind::Authorization);
        assert_eq!(Error::from_status(500, "m").kind(), ErrorKind::Server);
        assert_eq!(Error::Decode("m".into()).kind(), ErrorKind::Payload);
        assert_eq!(Error::invalid_filter("m").kind(), ErrorKind::Input);
        assert_eq!(Error::invalid_config("m").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
