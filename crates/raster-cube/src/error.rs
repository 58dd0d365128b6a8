//! Error types for cube construction and reduction.

use projection::ProjectionError;
use scene_common::SceneError;
use thiserror::Error;

/// Errors that can occur while building or materializing a cube.
#[derive(Error, Debug)]
pub enum CubeError {
    /// Failed to open an asset.
    #[error("failed to open {href}: {message}")]
    OpenFailed { href: String, message: String },

    /// Failed to read pixels from an opened asset.
    #[error("failed to read {href}: {message}")]
    ReadFailed { href: String, message: String },

    /// The asset carries no usable CRS or geotransform.
    #[error("{0} has no usable georeferencing")]
    MissingGeoreference(String),

    /// Pixel layout the reader does not handle (multi-sample, complex, ...).
    #[error("unsupported sample layout in {href}: {layout}")]
    UnsupportedLayout { href: String, layout: String },

    /// TIFF structure or compression error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Nothing to build a cube from.
    #[error("no items with a capture time to build a cube from")]
    NoItems,

    /// No explicit CRS and none of the items declares one.
    #[error("cannot choose a target CRS: no item declares proj:epsg")]
    NoTargetCrs,

    /// A band name that is not part of the cube or composite.
    #[error("unknown band '{0}'")]
    UnknownBand(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be created.
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl CubeError {
    /// Create an OpenFailed error. The href is stored without its query.
    pub fn open_failed(href: impl AsRef<str>, msg: impl ToString) -> Self {
        Self::OpenFailed {
            href: redact(href.as_ref()).to_string(),
            message: msg.to_string(),
        }
    }

    /// Create a ReadFailed error. The href is stored without its query.
    pub fn read_failed(href: impl AsRef<str>, msg: impl ToString) -> Self {
        Self::ReadFailed {
            href: redact(href.as_ref()).to_string(),
            message: msg.to_string(),
        }
    }
}

/// URL without its query string, so SAS tokens stay out of errors and logs.
pub(crate) fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Result type for cube operations.
pub type Result<T> = std::result::Result<T, CubeError>;
