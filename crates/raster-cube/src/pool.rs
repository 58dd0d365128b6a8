//! Worker pool for chunk materialization.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{CubeError, Result};

/// A dedicated rayon pool with `workers` threads (at least one).
///
/// Chunk reads block on HTTP, so this pool is kept separate from rayon's
/// global pool and from the async runtime.
pub fn build_pool(workers: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("cube-worker-{}", i))
        .build()
        .map_err(|e| CubeError::Pool(e.to_string()))
}
