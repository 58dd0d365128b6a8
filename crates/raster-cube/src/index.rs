//! Normalized-difference indices (NDVI and friends).

use ndarray::{Array2, Zip};
use scene_common::GridSpec;

use crate::composite::Composite;
use crate::error::Result;

/// Sentinel-2 near-infrared band.
pub const NIR_BAND: &str = "B08";
/// Sentinel-2 red band.
pub const RED_BAND: &str = "B04";

/// `(a - b) / (a + b)` for one pixel, clamped to `[-1, 1]`.
///
/// NaN when either input is missing or the sum is zero.
pub fn normalized_difference_value(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    let sum = a + b;
    if sum == 0.0 {
        return f32::NAN;
    }
    ((a - b) / sum).clamp(-1.0, 1.0)
}

/// A derived 2-D index on the composite grid.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexGrid {
    grid: GridSpec,
    data: Array2<f32>,
}

impl IndexGrid {
    pub fn new(grid: GridSpec, data: Array2<f32>) -> Self {
        Self { grid, data }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Values as `(rows, cols)`, NaN where undefined.
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Mean over defined pixels.
    pub fn mean(&self) -> Option<f64> {
        let (sum, n) = self
            .data
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// `(min, max)` over defined pixels.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Normalized difference of two composite bands.
pub fn normalized_difference(composite: &Composite, a: &str, b: &str) -> Result<IndexGrid> {
    let band_a = composite.band(a)?;
    let band_b = composite.band(b)?;
    let data = Zip::from(&band_a)
        .and(&band_b)
        .map_collect(|&x, &y| normalized_difference_value(x, y));
    Ok(IndexGrid::new(*composite.grid(), data))
}

/// NDVI from the Sentinel-2 NIR (B08) and red (B04) bands.
pub fn ndvi(composite: &Composite) -> Result<IndexGrid> {
    normalized_difference(composite, NIR_BAND, RED_BAND)
}
