//! Per-scene mean of a normalized-difference index over the AOI.

use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use projection::Transformer;
use rayon::prelude::*;
use rayon::ThreadPool;
use scene_common::EpsgCode;
use serde::Serialize;
use tracing::info;

use crate::cube::{ChunkWindow, RasterCube};
use crate::error::Result;
use crate::index::normalized_difference_value;

/// Index statistics for one time step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub datetime: DateTime<Utc>,
    pub scene_id: String,
    /// Mean over valid pixels; `None` when the scene has none (e.g. full cloud).
    pub mean: Option<f64>,
    /// Valid pixels divided by pixels inside the AOI.
    pub valid_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points that have a mean, as `(datetime, mean)`.
    pub fn valid_points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.mean.map(|m| (p.datetime, m)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Partial {
    sum: f64,
    valid: usize,
    inside: usize,
}

/// Mean of `(a - b) / (a + b)` per time step.
///
/// Only pixels whose centre falls inside the cube's AOI count, or every
/// pixel when the cube has none. Work is split over `(time, window)` pairs.
pub fn mean_index_series(cube: &RasterCube, a: &str, b: &str, pool: &ThreadPool) -> Result<TimeSeries> {
    let start = Instant::now();
    let band_a = cube.band_index(a)?;
    let band_b = cube.band_index(b)?;
    let windows = cube.chunk_windows();
    let times = cube.scenes().len();

    let partials: Vec<(usize, Partial)> = pool.install(|| -> Result<Vec<(usize, Partial)>> {
        let masks: Vec<Array2<bool>> = windows
            .par_iter()
            .map(|window| aoi_mask(cube, window))
            .collect::<Result<_>>()?;

        (0..times)
            .into_par_iter()
            .flat_map(|t| (0..windows.len()).into_par_iter().map(move |w| (t, w)))
            .map(|(t, w)| {
                let window = &windows[w];
                let mask = &masks[w];
                let nir = cube.read_chunk(t, band_a, window)?;
                let red = cube.read_chunk(t, band_b, window)?;

                let mut partial = Partial::default();
                for ((&inside, &x), &y) in mask.iter().zip(nir.iter()).zip(red.iter()) {
                    if !inside {
                        continue;
                    }
                    partial.inside += 1;
                    let v = normalized_difference_value(x, y);
                    if !v.is_nan() {
                        partial.sum += v as f64;
                        partial.valid += 1;
                    }
                }
                Ok((t, partial))
            })
            .collect()
    })?;

    let mut totals = vec![Partial::default(); times];
    for (t, p) in partials {
        totals[t].sum += p.sum;
        totals[t].valid += p.valid;
        totals[t].inside += p.inside;
    }

    let points: Vec<SeriesPoint> = cube
        .scenes()
        .iter()
        .zip(totals)
        .map(|(scene, total)| SeriesPoint {
            datetime: scene.datetime,
            scene_id: scene.id.clone(),
            mean: (total.valid > 0).then(|| total.sum / total.valid as f64),
            valid_fraction: if total.inside == 0 {
                0.0
            } else {
                total.valid as f64 / total.inside as f64
            },
        })
        .collect();

    info!(
        points = points.len(),
        with_data = points.iter().filter(|p| p.mean.is_some()).count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Index time series complete"
    );
    Ok(TimeSeries { points })
}

/// `true` for window pixels whose centre lies in the AOI.
fn aoi_mask(cube: &RasterCube, window: &ChunkWindow) -> Result<Array2<bool>> {
    let Some(aoi) = cube.aoi() else {
        return Ok(Array2::from_elem((window.height, window.width), true));
    };
    let grid = cube.grid();
    let to_wgs84 = Transformer::new(grid.crs, EpsgCode::WGS84)?;
    Ok(Array2::from_shape_fn((window.height, window.width), |(r, c)| {
        let (x, y) = grid.pixel_center(window.col + c, window.row + r);
        to_wgs84
            .transform(x, y)
            .map(|(lon, lat)| aoi.contains(lon, lat))
            .unwrap_or(false)
    }))
}
