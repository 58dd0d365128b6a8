//! Index grids resampled onto Web Mercator for map overlays.
//!
//! Leaflet places an image overlay linearly between its corner coordinates
//! in Web Mercator. An image on a UTM grid is rotated against that frame by
//! the grid convergence angle, so it is resampled before being overlaid.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use projection::Transformer;
use raster_cube::IndexGrid;
use scene_common::{EpsgCode, GeoTransform, GridSpec};

use crate::error::{RenderError, RenderResult};

/// Points per edge when projecting grid bounds.
const BOUNDS_DENSIFY: usize = 21;

/// Resample `index` onto a north-up Web Mercator grid covering its footprint.
///
/// The output keeps the source width; its height follows the Mercator
/// extent. Nearest neighbour, cells outside the source grid are NaN.
pub fn warp_to_web_mercator(index: &IndexGrid) -> RenderResult<IndexGrid> {
    let source = *index.grid();
    if source.is_empty() {
        return Err(RenderError::Empty("index grid has no pixels".to_string()));
    }
    if source.crs == EpsgCode::WEB_MERCATOR {
        return Ok(index.clone());
    }

    let bounds = Transformer::new(source.crs, EpsgCode::WEB_MERCATOR)?
        .transform_bbox(&source.bounds(), BOUNDS_DENSIFY)?;
    let width = source.width;
    let x_res = bounds.width() / width as f64;
    let height = ((bounds.height() / x_res).round() as usize).max(1);
    let target = GridSpec::new(
        EpsgCode::WEB_MERCATOR,
        GeoTransform {
            a: x_res,
            b: 0.0,
            c: bounds.min_x,
            d: 0.0,
            e: -bounds.height() / height as f64,
            f: bounds.max_y,
        },
        width,
        height,
    );

    let to_source = Transformer::new(EpsgCode::WEB_MERCATOR, source.crs)?;
    let values = index.data();
    let mut data = Array2::from_elem((height, width), f32::NAN);
    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut line)| {
            for (col, cell) in line.iter_mut().enumerate() {
                let (x, y) = target.pixel_center(col, row);
                let Ok((sx, sy)) = to_source.transform(x, y) else {
                    continue;
                };
                let Some((c, r)) = source.transform.invert(sx, sy) else {
                    continue;
                };
                if c >= 0.0 && r >= 0.0 {
                    if let Some(&value) = values.get((r as usize, c as usize)) {
                        *cell = value;
                    }
                }
            }
        });

    Ok(IndexGrid::new(target, data))
}
