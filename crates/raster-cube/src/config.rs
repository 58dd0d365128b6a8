//! Configuration for cube construction and materialization.

use serde::{Deserialize, Serialize};

/// Configuration for the raster cube.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeConfig {
    /// Output pixel size in target CRS units (metres for UTM).
    pub resolution: f64,

    /// Spatial chunk edge length in pixels (square chunks).
    pub chunk_size: usize,

    /// Worker threads used to materialize chunks.
    pub workers: usize,

    /// Memory budget for decoded TIFF tiles in megabytes.
    pub tile_cache_size_mb: usize,

    /// Number of open asset readers kept around.
    pub open_readers: usize,

    /// Size of one HTTP range request in kilobytes.
    pub range_block_kb: usize,

    /// Range blocks cached per open reader.
    pub range_cache_blocks: usize,

    /// Timeout for one range request in seconds.
    pub request_timeout_secs: u64,

    /// Retries for a failed range request.
    pub max_retries: u32,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            resolution: 10.0,
            chunk_size: 2048,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            tile_cache_size_mb: 1024,
            open_readers: 64,
            range_block_kb: 512,
            range_cache_blocks: 32,
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl CubeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CUBE_RESOLUTION") {
            if let Ok(res) = val.parse() {
                config.resolution = res;
            }
        }

        if let Ok(val) = std::env::var("CUBE_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("CUBE_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.workers = workers;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_SIZE_MB") {
            if let Ok(size) = val.parse() {
                config.tile_cache_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("RANGE_BLOCK_KB") {
            if let Ok(size) = val.parse() {
                config.range_block_kb = size;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(format!("resolution must be > 0, got {}", self.resolution));
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }

        if self.range_block_kb == 0 {
            return Err("range_block_kb must be > 0".to_string());
        }

        Ok(())
    }

    /// Get the tile cache size in bytes.
    pub fn tile_cache_size_bytes(&self) -> usize {
        self.tile_cache_size_mb * 1024 * 1024
    }

    /// Get the range block size in bytes.
    pub fn range_block_bytes(&self) -> u64 {
        self.range_block_kb as u64 * 1024
    }
}
