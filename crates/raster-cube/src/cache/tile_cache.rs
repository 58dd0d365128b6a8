//! LRU cache for decoded TIFF tiles.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::CacheStats;

/// Cache key for tiles: (asset href hash, TIFF chunk index).
pub type TileKey = (u64, u32);

/// One decoded TIFF tile (or strip), nodata already mapped to NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Row stride of `data` in pixels
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Tile {
    fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.width + col]
    }
}

/// LRU cache for decoded tiles with memory-bounded eviction.
pub struct TileCache {
    cache: LruCache<TileKey, Arc<Tile>>,
    memory_limit: usize,
    current_memory: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a new tile cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        // Sentinel-2 COG tiles are 1024x1024 f32 once decoded
        let tile_size_estimate = 1024 * 1024 * 4;
        let max_entries = (memory_limit / tile_size_estimate).max(16);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Try to get a tile from the cache.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<Tile>> {
        if let Some(tile) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(tile))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert a tile, evicting least recently used entries to make room.
    pub fn insert(&mut self, key: TileKey, tile: Arc<Tile>) {
        let size = tile.size_bytes();

        while self.current_memory + size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self.current_memory.saturating_sub(evicted.size_bytes());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Only insert if the tile fits (or cache was empty)
        if size <= self.memory_limit {
            if let Some((_, replaced)) = self.cache.push(key, tile) {
                self.current_memory = self.current_memory.saturating_sub(replaced.size_bytes());
            }
            self.current_memory += size;
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Hash an asset href for use in a tile key.
pub fn hash_href(href: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    href.hash(&mut hasher);
    hasher.finish()
}
