//! Common types shared across the scene compositing crates.

pub mod aoi;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod time;

pub use aoi::AreaOfInterest;
pub use bbox::BoundingBox;
pub use crs::EpsgCode;
pub use error::{SceneError, SceneResult};
pub use grid::{GeoTransform, GridSpec};
pub use time::DateRange;
