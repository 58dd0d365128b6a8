//! Error types for coordinate transformations.

use scene_common::EpsgCode;
use thiserror::Error;

/// Errors raised while building or applying a transformation.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// No implementation exists for this CRS.
    #[error("unsupported CRS {0}")]
    UnsupportedCrs(EpsgCode),

    /// The point cannot be represented in the target CRS.
    #[error("point ({x}, {y}) is outside the domain of {crs}")]
    OutOfDomain { x: f64, y: f64, crs: EpsgCode },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
