//! Error types for scene compositing.

use thiserror::Error;

/// Result type alias using SceneError.
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors raised while building the shared geometry and time types.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Invalid area of interest: {0}")]
    InvalidAoi(String),

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        SceneError::InvalidAoi(format!("JSON error: {}", err))
    }
}
