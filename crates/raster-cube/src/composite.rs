//! Temporal median composite.

use std::time::Instant;

use ndarray::{s, Array2, Array3, ArrayView2};
use rayon::prelude::*;
use rayon::ThreadPool;
use scene_common::GridSpec;
use tracing::{debug, info};

use crate::cube::{ChunkWindow, RasterCube};
use crate::error::{CubeError, Result};

/// Per-pixel median over time, `{band, y, x}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    grid: GridSpec,
    bands: Vec<String>,
    data: Array3<f32>,
}

impl Composite {
    pub fn new(grid: GridSpec, bands: Vec<String>, data: Array3<f32>) -> Result<Self> {
        let expected = (bands.len(), grid.height, grid.width);
        if data.dim() != expected {
            return Err(CubeError::Config(format!(
                "composite data is {:?}, expected {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self { grid, bands, data })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// One band as `(rows, cols)`.
    pub fn band(&self, name: &str) -> Result<ArrayView2<'_, f32>> {
        let index = self
            .bands
            .iter()
            .position(|b| b == name)
            .ok_or_else(|| CubeError::UnknownBand(name.to_string()))?;
        Ok(self.data.slice(s![index, .., ..]))
    }
}

/// Median of the finite values in `values`, NaN if there are none.
///
/// Even counts average the two middle values. Reorders `values`.
pub fn nan_median(values: &mut Vec<f32>) -> f32 {
    values.retain(|v| !v.is_nan());
    let n = values.len();
    if n == 0 {
        return f32::NAN;
    }

    let mid = n / 2;
    let (_, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return upper;
    }
    // Largest value below the upper middle
    let lower = values[..mid]
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    (lower + upper) / 2.0
}

/// Reduce the cube along time with a NaN-skipping median.
///
/// Chunk windows are processed in parallel on `pool`; each loads every
/// `(time, band)` chunk of its window. Blocks the calling thread.
pub fn median_composite(cube: &RasterCube, pool: &ThreadPool) -> Result<Composite> {
    let start = Instant::now();
    let windows = cube.chunk_windows();
    let [_, bands, height, width] = cube.shape();

    let blocks: Vec<(ChunkWindow, Array3<f32>)> = pool.install(|| {
        windows
            .par_iter()
            .map(|window| composite_window(cube, window).map(|block| (*window, block)))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut data = Array3::from_elem((bands, height, width), f32::NAN);
    for (window, block) in blocks {
        data.slice_mut(s![
            ..,
            window.row..window.row + window.height,
            window.col..window.col + window.width
        ])
        .assign(&block);
    }

    info!(
        bands = bands,
        height = height,
        width = width,
        times = cube.scenes().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Median composite complete"
    );
    Composite::new(*cube.grid(), cube.bands().to_vec(), data)
}

fn composite_window(cube: &RasterCube, window: &ChunkWindow) -> Result<Array3<f32>> {
    let times = cube.scenes().len();
    let bands = cube.bands().len();
    let mut block = Array3::from_elem((bands, window.height, window.width), f32::NAN);

    for band in 0..bands {
        let slices: Vec<Array2<f32>> = (0..times)
            .map(|t| cube.read_chunk(t, band, window))
            .collect::<Result<_>>()?;

        let mut values = Vec::with_capacity(times);
        for r in 0..window.height {
            for c in 0..window.width {
                values.clear();
                values.extend(slices.iter().map(|slice| slice[[r, c]]));
                block[[band, r, c]] = nan_median(&mut values);
            }
        }
    }

    debug!(col = window.col, row = window.row, "Composited chunk");
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(nan_median(&mut vec![3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn test_median_even_averages_middle() {
        assert_eq!(nan_median(&mut vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(nan_median(&mut vec![10.0, 10.0]), 10.0);
    }

    #[test]
    fn test_median_skips_nan() {
        assert_eq!(nan_median(&mut vec![f32::NAN, 5.0, f32::NAN, 1.0, 3.0]), 3.0);
        assert_eq!(nan_median(&mut vec![f32::NAN, 8.0]), 8.0);
    }

    #[test]
    fn test_median_all_nan() {
        assert!(nan_median(&mut vec![f32::NAN, f32::NAN]).is_nan());
        assert!(nan_median(&mut vec![]).is_nan());
    }

    #[test]
    fn test_composite_shape_checked() {
        let grid = GridSpec::new(
            scene_common::EpsgCode(32610),
            scene_common::GeoTransform::north_up(0.0, 0.0, 10.0),
            4,
            3,
        );
        assert!(Composite::new(grid, vec!["B04".into()], Array3::zeros((1, 3, 4))).is_ok());
        assert!(Composite::new(grid, vec!["B04".into()], Array3::zeros((1, 4, 3))).is_err());
    }
}
