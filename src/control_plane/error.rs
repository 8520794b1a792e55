//! Error types for control-plane REST calls.

use thiserror::Error;

/// Errors returned by [`super::ControlPlaneApi`] implementations.
#[derive(Debug, Clone, Error)]
pub enum ControlPlaneError {
    /// Request timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-success HTTP status
    #[error("HTTP error {status} from {path}")]
    HttpError { status: u16, path: String },

    /// Body did not match the expected shape
    #[error("invalid response: {0}")]
    ParseError(String),

    /// Base URL or path could not be built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ControlPlaneError {
    pub(crate) fn classify(e: reqwest::Error, timeout_seconds: u64) -> Self {
        if e.is_timeout() {
            ControlPlaneError::Timeout(timeout_seconds)
        } else if e.is_decode() {
            ControlPlaneError::ParseError(e.to_string())
        } else {
            ControlPlaneError::ConnectionFailed(e.to_string())
        }
    }
}
