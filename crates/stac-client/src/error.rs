//! Error types for catalog access.

use thiserror::Error;

/// Errors that can occur while searching or signing.
#[derive(Error, Debug)]
pub enum StacError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON document.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Invalid API root or asset URL.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// Token acquisition or URL signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Search parameters were rejected before sending.
    #[error("invalid search: {0}")]
    InvalidSearch(String),
}

impl StacError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StacError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            StacError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, StacError>;
