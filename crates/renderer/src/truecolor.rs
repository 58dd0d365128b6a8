//! True-colour rendering with a per-band percentile stretch.

use ndarray::{ArrayView2, Zip};
use raster_cube::Composite;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::style::RenderStyle;

/// Sentinel-2 red, green and blue band keys.
pub const TRUE_COLOR_BANDS: [&str; 3] = ["B04", "B03", "B02"];

/// Percentile `p` (0-100) of finite values, interpolating linearly between
/// closest ranks.
pub fn percentile(values: &[f32], p: f64) -> Option<f32> {
    let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_unstable_by(f32::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (finite.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = (rank - lower as f64) as f32;
    Some(finite[lower] + (finite[upper] - finite[lower]) * frac)
}

/// `(low, high)` stretch bounds of one band.
pub fn stretch_bounds(band: ArrayView2<'_, f32>, low: f64, high: f64) -> Option<(f32, f32)> {
    let values: Vec<f32> = band.iter().copied().collect();
    Some((percentile(&values, low)?, percentile(&values, high)?))
}

fn scale(value: f32, (low, high): (f32, f32)) -> u8 {
    let range = high - low;
    let range = if range.abs() < f32::EPSILON { 1.0 } else { range };
    (((value - low) / range).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Stretch three bands into RGBA bytes.
///
/// Each band is stretched independently between its `low` and `high`
/// percentiles. A pixel missing in any band is transparent.
pub fn stretch_rgb(
    red: ArrayView2<'_, f32>,
    green: ArrayView2<'_, f32>,
    blue: ArrayView2<'_, f32>,
    low: f64,
    high: f64,
) -> RenderResult<Vec<u8>> {
    for dim in [green.dim(), blue.dim()] {
        if dim != red.dim() {
            return Err(RenderError::ShapeMismatch(red.dim(), dim));
        }
    }
    let empty = || RenderError::Empty("true-colour bands have no valid pixels".into());
    let bounds = [
        stretch_bounds(red, low, high).ok_or_else(empty)?,
        stretch_bounds(green, low, high).ok_or_else(empty)?,
        stretch_bounds(blue, low, high).ok_or_else(empty)?,
    ];
    debug!(?bounds, low, high, "True-colour stretch bounds");

    let mut pixels = Vec::with_capacity(red.len() * 4);
    Zip::from(&red)
        .and(&green)
        .and(&blue)
        .for_each(|&r, &g, &b| {
            if r.is_nan() || g.is_nan() || b.is_nan() {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                pixels.extend_from_slice(&[
                    scale(r, bounds[0]),
                    scale(g, bounds[1]),
                    scale(b, bounds[2]),
                    255,
                ]);
            }
        });
    Ok(pixels)
}

/// Render the composite's B04/B03/B02 as RGBA; returns `(rgba, width, height)`.
pub fn render_true_color(
    composite: &Composite,
    style: &RenderStyle,
) -> RenderResult<(Vec<u8>, usize, usize)> {
    let [r, g, b] = TRUE_COLOR_BANDS;
    let band = |name: &str| {
        composite
            .band(name)
            .map_err(|e| RenderError::Empty(e.to_string()))
    };
    let red = band(r)?;
    let pixels = stretch_rgb(red, band(g)?, band(b)?, style.stretch_low, style.stretch_high)?;
    Ok((pixels, red.ncols(), red.nrows()))
}
