//! Error types for rendering.

use projection::ProjectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Pixel buffer does not match the stated dimensions.
    #[error("invalid image dimensions {width}x{height} for {len} bytes")]
    InvalidDimensions {
        width: usize,
        height: usize,
        len: usize,
    },

    /// Bands of a multi-band image differ in shape.
    #[error("band shapes differ: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),

    #[error("chart drawing failed: {0}")]
    Chart(String),

    /// Nothing to draw.
    #[error("no data to render: {0}")]
    Empty(String),

    #[error("invalid style: {0}")]
    Style(String),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
