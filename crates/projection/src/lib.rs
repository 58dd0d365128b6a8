//! Coordinate reference system transformations.
//!
//! Implements the handful of map projections Sentinel-2 processing needs
//! from scratch: WGS84 UTM zones (transverse Mercator) and spherical
//! Web Mercator.

pub mod error;
pub mod mercator;
pub mod transform;
pub mod utm;

pub use error::{ProjectionError, Result};
pub use transform::Transformer;
pub use utm::TransverseMercator;
