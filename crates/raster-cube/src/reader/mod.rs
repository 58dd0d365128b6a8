//! Raster access behind the cube.
//!
//! The cube only sees [`RasterSource`] / [`RasterAsset`]; [`CogSource`] is
//! the implementation that reads Cloud Optimized GeoTIFFs over HTTP (or from
//! local paths).

mod cog;
mod range;

use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use lru::LruCache;
use ndarray::Array2;
use scene_common::{EpsgCode, GeoTransform};
use tracing::debug;

pub use cog::{CogReader, GeoHints, ReadSeek};
pub use range::HttpRangeReader;

use crate::cache::{CacheStats, TileCache};
use crate::config::CubeConfig;
use crate::error::{redact, CubeError, Result};

/// Where a raster sits and how its pixels map to the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Georeference {
    pub crs: EpsgCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub nodata: Option<f64>,
}

/// A rectangle of source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

/// One band of one scene, as referenced from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRef {
    pub href: String,
    pub hints: GeoHints,
}

impl AssetRef {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            hints: GeoHints::default(),
        }
    }
}

/// An opened single-band raster.
pub trait RasterAsset: Send + Sync {
    fn georeference(&self) -> &Georeference;

    /// Read a window as `(rows, cols)`, nodata as NaN.
    fn read_window(&self, window: &PixelWindow) -> Result<Array2<f32>>;
}

/// Opens assets for the cube. Called from worker threads.
pub trait RasterSource: Send + Sync {
    fn open(&self, asset: &AssetRef) -> Result<Arc<dyn RasterAsset>>;
}

/// [`RasterSource`] for COGs over HTTP(S) range requests or local files.
pub struct CogSource {
    config: CubeConfig,
    /// Built on first use, from a worker thread.
    http: OnceLock<reqwest::blocking::Client>,
    readers: Mutex<LruCache<String, Arc<CogReader>>>,
    tiles: Arc<Mutex<TileCache>>,
}

impl CogSource {
    pub fn new(config: CubeConfig) -> Self {
        let capacity = NonZeroUsize::new(config.open_readers.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiles: Arc::new(Mutex::new(TileCache::new(config.tile_cache_size_bytes()))),
            readers: Mutex::new(LruCache::new(capacity)),
            http: OnceLock::new(),
            config,
        }
    }

    /// Tile cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.tiles
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    fn http(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(self.config.workers.max(1))
            .build()
            .map_err(|e| CubeError::Config(format!("HTTP client: {}", e)))?;
        Ok(self.http.get_or_init(|| client))
    }

    fn open_reader(&self, href: &str) -> Result<Box<dyn ReadSeek>> {
        if href.starts_with("http://") || href.starts_with("https://") {
            let reader = HttpRangeReader::open(
                self.http()?.clone(),
                href,
                self.config.range_block_bytes(),
                self.config.range_cache_blocks,
                self.config.max_retries,
            )?;
            Ok(Box::new(reader))
        } else {
            let path = href.strip_prefix("file://").unwrap_or(href);
            let file = File::open(path).map_err(|e| CubeError::open_failed(href, e))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

impl RasterSource for CogSource {
    fn open(&self, asset: &AssetRef) -> Result<Arc<dyn RasterAsset>> {
        let cached = self
            .readers
            .lock()
            .map_err(|_| CubeError::open_failed(&asset.href, "reader cache lock poisoned"))?
            .get(&asset.href)
            .cloned();
        if let Some(reader) = cached {
            return Ok(reader);
        }

        let reader = Arc::new(CogReader::open(
            &asset.href,
            self.open_reader(&asset.href)?,
            asset.hints,
            Arc::clone(&self.tiles),
        )?);
        debug!(href = %redact(&asset.href), "Caching asset reader");

        self.readers
            .lock()
            .map_err(|_| CubeError::open_failed(&asset.href, "reader cache lock poisoned"))?
            .put(asset.href.clone(), Arc::clone(&reader));
        Ok(reader)
    }
}
