//! Point and bounding-box transformation between supported CRSs.
//!
//! Every transformation goes through WGS84 geographic coordinates, so a
//! UTM-to-UTM transform is an inverse followed by a forward projection.

use scene_common::{BoundingBox, EpsgCode};

use crate::error::{ProjectionError, Result};
use crate::mercator;
use crate::utm::TransverseMercator;

/// One side of a transformation.
#[derive(Debug, Clone)]
enum Side {
    Geographic,
    WebMercator,
    Utm(TransverseMercator),
}

impl Side {
    fn for_code(code: EpsgCode) -> Result<Self> {
        if code.is_geographic() {
            return Ok(Side::Geographic);
        }
        if code == EpsgCode::WEB_MERCATOR {
            return Ok(Side::WebMercator);
        }
        TransverseMercator::from_epsg(code)
            .map(Side::Utm)
            .ok_or(ProjectionError::UnsupportedCrs(code))
    }

    fn to_lonlat(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Side::Geographic => (x, y),
            Side::WebMercator => mercator::inverse(x, y),
            Side::Utm(tm) => tm.inverse(x, y),
        }
    }

    fn from_lonlat(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Side::Geographic => (lon, lat),
            Side::WebMercator => mercator::forward(lon, lat),
            Side::Utm(tm) => tm.forward(lon, lat),
        }
    }
}

/// A reusable transformation from one CRS to another.
#[derive(Debug, Clone)]
pub struct Transformer {
    source: EpsgCode,
    target: EpsgCode,
    from: Side,
    to: Side,
}

impl Transformer {
    pub fn new(source: EpsgCode, target: EpsgCode) -> Result<Self> {
        Ok(Self {
            source,
            target,
            from: Side::for_code(source)?,
            to: Side::for_code(target)?,
        })
    }

    pub fn source(&self) -> EpsgCode {
        self.source
    }

    pub fn target(&self) -> EpsgCode {
        self.target
    }

    /// True when source and target are the same CRS.
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Transform a single point.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_identity() {
            return Ok((x, y));
        }

        let (lon, lat) = self.from.to_lonlat(x, y);
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return Err(ProjectionError::OutOfDomain {
                x,
                y,
                crs: self.source,
            });
        }

        let (tx, ty) = self.to.from_lonlat(lon, lat);
        if !tx.is_finite() || !ty.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x: lon,
                y: lat,
                crs: self.target,
            });
        }
        Ok((tx, ty))
    }

    /// Transform a bounding box, returning the box enclosing the transformed
    /// outline.
    ///
    /// Edges are sampled at `densify` intermediate points each because
    /// straight edges in one CRS are curves in another.
    pub fn transform_bbox(&self, bbox: &BoundingBox, densify: usize) -> Result<BoundingBox> {
        if self.is_identity() {
            return Ok(*bbox);
        }

        let steps = densify + 1;
        let mut points = Vec::with_capacity(4 * steps);
        for s in 0..steps {
            let frac = s as f64 / steps as f64;
            let x = bbox.min_x + frac * bbox.width();
            let y = bbox.min_y + frac * bbox.height();
            // Bottom, right, top, left edges
            points.push(self.transform(x, bbox.min_y)?);
            points.push(self.transform(bbox.max_x, y)?);
            points.push(self.transform(bbox.max_x - frac * bbox.width(), bbox.max_y)?);
            points.push(self.transform(bbox.min_x, bbox.max_y - frac * bbox.height())?);
        }

        BoundingBox::from_points(points).ok_or(ProjectionError::OutOfDomain {
            x: bbox.min_x,
            y: bbox.min_y,
            crs: self.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity() {
        let t = Transformer::new(EpsgCode(32610), EpsgCode(32610)).unwrap();
        assert!(t.is_identity());
        assert_eq!(t.transform(1.0, 2.0).unwrap(), (1.0, 2.0));
    }

    #[test]
    fn test_unsupported() {
        assert!(matches!(
            Transformer::new(EpsgCode(2154), EpsgCode::WGS84),
            Err(ProjectionError::UnsupportedCrs(EpsgCode(2154)))
        ));
    }

    #[test]
    fn test_lonlat_to_utm_and_back() {
        let fwd = Transformer::new(EpsgCode::WGS84, EpsgCode(32610)).unwrap();
        let inv = Transformer::new(EpsgCode(32610), EpsgCode::WGS84).unwrap();
        let (x, y) = fwd.transform(-122.5, 47.5).unwrap();
        let (lon, lat) = inv.transform(x, y).unwrap();
        assert_abs_diff_eq!(lon, -122.5, epsilon = 1e-7);
        assert_abs_diff_eq!(lat, 47.5, epsilon = 1e-7);
    }

    #[test]
    fn test_zone_to_zone() {
        // A point at the 10/11 boundary is representable in both zones.
        let to_lonlat = Transformer::new(EpsgCode(32611), EpsgCode::WGS84).unwrap();
        let cross = Transformer::new(EpsgCode(32610), EpsgCode(32611)).unwrap();
        let from_lonlat = Transformer::new(EpsgCode::WGS84, EpsgCode(32610)).unwrap();

        let (x10, y10) = from_lonlat.transform(-120.0, 46.0).unwrap();
        let (x11, y11) = cross.transform(x10, y10).unwrap();
        let (lon, lat) = to_lonlat.transform(x11, y11).unwrap();
        assert_abs_diff_eq!(lon, -120.0, epsilon = 1e-6);
        assert_abs_diff_eq!(lat, 46.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bbox_encloses_corners() {
        let t = Transformer::new(EpsgCode::WGS84, EpsgCode(32610)).unwrap();
        let bbox = BoundingBox::new(-122.4, 47.5, -122.2, 47.7);
        let out = t.transform_bbox(&bbox, 8).unwrap();
        for &(lon, lat) in &[(-122.4, 47.5), (-122.2, 47.5), (-122.2, 47.7), (-122.4, 47.7)] {
            let (x, y) = t.transform(lon, lat).unwrap();
            assert!(out.contains_point(x, y));
        }
        // Roughly 15 km wide, 22 km tall
        assert!(out.width() > 14_000.0 && out.width() < 16_000.0);
        assert!(out.height() > 21_000.0 && out.height() < 23_000.0);
    }
}
