//! Lazy raster cube over Cloud Optimized GeoTIFFs.
//!
//! Catalog items become a `{time, band, y, x}` cube on one common grid.
//! Nothing is downloaded until a chunk is materialized; reductions then
//! pull only the internal TIFF tiles they touch.
//!
//! # Architecture
//!
//! ```text
//! Vec<stac_client::Item>
//!      │
//!      ▼
//! CubeBuilder::build()           target CRS + snapped grid, no I/O
//!      │
//!      ▼
//! RasterCube (lazy)
//!      │
//!      ├─► median_composite(cube, pool)      par over chunk windows
//!      │         │
//!      │         └─► read_chunk(t, band, window)
//!      │                   │
//!      │                   ├─► CogSource::open  (reader LRU)
//!      │                   │        │
//!      │                   │        └─► HttpRangeReader (block LRU)
//!      │                   │
//!      │                   └─► CogReader::read_window
//!      │                            │
//!      │                            └─► TileCache hit / decode tile
//!      │
//!      └─► mean_index_series(cube, a, b, pool)
//!
//! Composite ──► ndvi() ──► IndexGrid
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_cube::{build_pool, median_composite, ndvi, CogSource, CubeBuilder, CubeConfig};
//!
//! let config = CubeConfig::from_env();
//! let source = Arc::new(CogSource::new(config.clone()));
//! let cube = CubeBuilder::from_config(aoi, bands, &config).build(&items, source)?;
//!
//! let pool = build_pool(config.workers)?;
//! let composite = median_composite(&cube, &pool)?;
//! let index = ndvi(&composite)?;
//! ```

pub mod cache;
pub mod composite;
pub mod config;
pub mod cube;
pub mod error;
pub mod index;
pub mod pool;
pub mod reader;
pub mod timeseries;

pub use cache::{CacheStats, TileCache};
pub use composite::{median_composite, nan_median, Composite};
pub use config::CubeConfig;
pub use cube::{most_common_epsg, ChunkWindow, CubeBuilder, RasterCube, Scene};
pub use error::{CubeError, Result};
pub use index::{ndvi, normalized_difference, IndexGrid, NIR_BAND, RED_BAND};
pub use pool::build_pool;
pub use reader::{
    AssetRef, CogReader, CogSource, GeoHints, Georeference, HttpRangeReader, PixelWindow,
    RasterAsset, RasterSource,
};
pub use timeseries::{mean_index_series, SeriesPoint, TimeSeries};
