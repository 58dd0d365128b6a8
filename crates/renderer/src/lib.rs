//! Output rendering for composites and index grids.
//!
//! Implements the pipeline's outputs:
//! - True-colour PNG with a percentile stretch
//! - Index PNG through a color ramp (RdYlGn for NDVI)
//! - Leaflet web map with the index overlay (resampled to Web Mercator) and the AOI
//! - SVG time-series chart (plotters)

pub mod chart;
pub mod error;
pub mod gradient;
pub mod map;
pub mod png;
pub mod style;
pub mod truecolor;
pub mod warp;

pub use chart::render_timeseries_svg;
pub use error::{RenderError, RenderResult};
pub use gradient::{render_grid, render_index, Color, ColorRamp};
pub use map::{render_map_html, wgs84_bounds, MapOverlay};
pub use png::{create_png, create_png_auto};
pub use style::RenderStyle;
pub use truecolor::{render_true_color, stretch_rgb, TRUE_COLOR_BANDS};
pub use warp::warp_to_web_mercator;
