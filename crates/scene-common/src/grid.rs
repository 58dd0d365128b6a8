//! Grid specifications for raster data.

use crate::{BoundingBox, EpsgCode, SceneError, SceneResult};
use serde::{Deserialize, Serialize};

/// Affine pixel-to-world transform in the rasterio / STAC `proj:transform`
/// order:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// `(col, row)` address pixel corners; pixel centres sit at `+0.5`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels anchored at the top-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, resolution: f64) -> Self {
        Self {
            a: resolution,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -resolution,
            f: origin_y,
        }
    }

    /// Build from the 6 (or 9) element STAC `proj:transform` array.
    pub fn from_stac(values: &[f64]) -> Option<Self> {
        if values.len() < 6 {
            return None;
        }
        Some(Self {
            a: values[0],
            b: values[1],
            c: values[2],
            d: values[3],
            e: values[4],
            f: values[5],
        })
    }

    /// World coordinates of a (fractional) pixel position.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Fractional pixel position of a world coordinate.
    ///
    /// Returns `None` when the transform is singular.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (-self.d * dx + self.a * dy) / det;
        Some((col, row))
    }

    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0 && self.a > 0.0 && self.e < 0.0
    }
}

/// A regular raster grid: CRS, affine transform and pixel dimensions.
///
/// Every slice of a raster cube shares one `GridSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: EpsgCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn new(crs: EpsgCode, transform: GeoTransform, width: usize, height: usize) -> Self {
        Self {
            crs,
            transform,
            width,
            height,
        }
    }

    /// North-up grid covering `bounds`, with edges snapped outward to
    /// multiples of `resolution`.
    pub fn covering(crs: EpsgCode, bounds: &BoundingBox, resolution: f64) -> SceneResult<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SceneError::InvalidGrid(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            return Err(SceneError::InvalidGrid(format!(
                "empty bounds {:?}",
                bounds
            )));
        }

        let snapped = bounds.snap_outward(resolution);
        let width = (snapped.width() / resolution).round() as usize;
        let height = (snapped.height() / resolution).round() as usize;

        Ok(Self {
            crs,
            transform: GeoTransform::north_up(snapped.min_x, snapped.max_y, resolution),
            width,
            height,
        })
    }

    /// World coordinates of a pixel centre.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Outer bounds of the grid in its CRS.
    pub fn bounds(&self) -> BoundingBox {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(self.width as f64, 0.0),
            self.transform.apply(0.0, self.height as f64),
            self.transform.apply(self.width as f64, self.height as f64),
        ];
        BoundingBox::from_points(corners).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Pixel size along x.
    pub fn resolution(&self) -> f64 {
        self.transform.a.abs()
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covering_snaps_and_sizes() {
        let bounds = BoundingBox::new(500_003.0, 4_199_987.0, 500_996.0, 4_200_512.0);
        let grid = GridSpec::covering(EpsgCode(32610), &bounds, 10.0).unwrap();
        assert_eq!(grid.width, 100);
        assert_eq!(grid.height, 54);
        assert_eq!(grid.transform.c, 500_000.0);
        assert_eq!(grid.transform.f, 4_200_520.0);
        let covered = grid.bounds();
        assert!(covered.min_x <= bounds.min_x && covered.max_x >= bounds.max_x);
        assert!(covered.min_y <= bounds.min_y && covered.max_y >= bounds.max_y);
    }

    #[test]
    fn test_pixel_center_and_invert() {
        let transform = GeoTransform::north_up(600_000.0, 5_000_000.0, 10.0);
        let (x, y) = transform.apply(0.5, 0.5);
        assert_eq!((x, y), (600_005.0, 4_999_995.0));
        let (col, row) = transform.invert(600_105.0, 4_999_895.0).unwrap();
        assert!((col - 10.5).abs() < 1e-9);
        assert!((row - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_stac() {
        let t = GeoTransform::from_stac(&[10.0, 0.0, 399960.0, 0.0, -10.0, 5300040.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert!(t.is_north_up());
        assert!(GeoTransform::from_stac(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(GridSpec::covering(EpsgCode::WGS84, &bounds, 0.0).is_err());
        assert!(GridSpec::covering(EpsgCode::WGS84, &bounds, -1.0).is_err());
    }
}
