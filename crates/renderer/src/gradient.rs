//! Color ramp rendering for index grids.

use ndarray::ArrayView2;
use raster_cube::IndexGrid;

use crate::error::{RenderError, RenderResult};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    /// `#rrggbb` for HTML and SVG output.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// ColorBrewer RdYlGn, 11 classes, red (low) to green (high).
pub const RDYLGN: [Color; 11] = [
    Color::rgb(165, 0, 38),
    Color::rgb(215, 48, 39),
    Color::rgb(244, 109, 67),
    Color::rgb(253, 174, 97),
    Color::rgb(254, 224, 139),
    Color::rgb(255, 255, 191),
    Color::rgb(217, 239, 139),
    Color::rgb(166, 217, 106),
    Color::rgb(102, 189, 99),
    Color::rgb(26, 152, 80),
    Color::rgb(0, 104, 55),
];

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)).round() as u8,
    )
}

/// Piecewise-linear ramp over sorted value stops.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<(f32, Color)>,
}

impl ColorRamp {
    /// Stops must be non-empty and strictly increasing in value.
    pub fn new(stops: Vec<(f32, Color)>) -> RenderResult<Self> {
        if stops.is_empty() {
            return Err(RenderError::Style("color ramp needs at least one stop".into()));
        }
        if stops.windows(2).any(|w| !(w[0].0 < w[1].0)) {
            return Err(RenderError::Style("color stops must be strictly increasing".into()));
        }
        Ok(Self { stops })
    }

    /// `colors` spread evenly over `[min, max]`.
    pub fn evenly_spaced(colors: &[Color], min: f32, max: f32) -> RenderResult<Self> {
        let n = colors.len();
        if n < 2 || !(min < max) {
            return Err(RenderError::Style(format!(
                "need two or more colors over an increasing range, got {} over [{}, {}]",
                n, min, max
            )));
        }
        let step = (max - min) / (n - 1) as f32;
        Self::new(
            colors
                .iter()
                .enumerate()
                .map(|(i, &c)| (min + step * i as f32, c))
                .collect(),
        )
    }

    /// Red-yellow-green over `[-1, 1]`, for vegetation indices.
    pub fn rdylgn() -> Self {
        let step = 2.0 / (RDYLGN.len() - 1) as f32;
        Self {
            stops: RDYLGN
                .iter()
                .enumerate()
                .map(|(i, &c)| (-1.0 + step * i as f32, c))
                .collect(),
        }
    }

    pub fn stops(&self) -> &[(f32, Color)] {
        &self.stops
    }

    /// Value range covered by the stops.
    pub fn range(&self) -> (f32, f32) {
        (self.stops[0].0, self.stops[self.stops.len() - 1].0)
    }

    /// Color for `value`; clamps outside the stops, transparent for NaN.
    pub fn color(&self, value: f32) -> Color {
        if value.is_nan() {
            return Color::transparent();
        }
        let (first, last) = (self.stops[0], self.stops[self.stops.len() - 1]);
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }
        let upper = self.stops.partition_point(|(v, _)| *v <= value);
        let (v0, c0) = self.stops[upper - 1];
        let (v1, c1) = self.stops[upper];
        interpolate_color(c0, c1, (value - v0) / (v1 - v0))
    }
}

/// Render a grid through `ramp` as RGBA bytes, NaN transparent.
pub fn render_grid(data: ArrayView2<'_, f32>, ramp: &ColorRamp) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(data.len() * 4);
    for &value in data.iter() {
        let color = ramp.color(value);
        pixels.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }
    pixels
}

/// Render an index grid with the RdYlGn ramp; returns `(rgba, width, height)`.
pub fn render_index(index: &IndexGrid, ramp: &ColorRamp) -> (Vec<u8>, usize, usize) {
    (
        render_grid(index.data().view(), ramp),
        index.width(),
        index.height(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rdylgn_endpoints() {
        let ramp = ColorRamp::rdylgn();
        assert_eq!(ramp.range(), (-1.0, 1.0));
        assert_eq!(ramp.color(-1.0), RDYLGN[0]);
        assert_eq!(ramp.color(0.0), RDYLGN[5]);
        assert_eq!(ramp.color(1.0), RDYLGN[10]);
        assert_eq!(ramp.color(5.0), RDYLGN[10]);
        assert_eq!(ramp.color(f32::NAN), Color::transparent());
    }

    #[test]
    fn test_interpolates_between_stops() {
        let ramp = ColorRamp::new(vec![
            (0.0, Color::rgb(0, 0, 0)),
            (1.0, Color::rgb(200, 100, 50)),
        ])
        .unwrap();
        assert_eq!(ramp.color(0.5), Color::rgb(100, 50, 25));
    }

    #[test]
    fn test_evenly_spaced_stops() {
        let ramp = ColorRamp::evenly_spaced(&RDYLGN[..4], -0.2, 0.7).unwrap();
        let values: Vec<f32> = ramp.stops().iter().map(|(v, _)| *v).collect();
        for (value, expected) in values.iter().zip([-0.2, 0.1, 0.4, 0.7]) {
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
        }
        assert_eq!(ramp.color(1.0), RDYLGN[3]);
        assert_eq!(ramp.color(-0.5), RDYLGN[0]);
    }

    #[test]
    fn test_rejects_unsorted_stops() {
        assert!(ColorRamp::new(vec![]).is_err());
        assert!(ColorRamp::new(vec![(1.0, Color::rgb(0, 0, 0)), (0.0, Color::rgb(1, 1, 1))]).is_err());
        assert!(ColorRamp::evenly_spaced(&RDYLGN, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_render_grid_nan_transparent() {
        let data = array![[-1.0f32, f32::NAN], [1.0, 0.0]];
        let pixels = render_grid(data.view(), &ColorRamp::rdylgn());
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[0..4], &[165, 0, 38, 255]);
        assert_eq!(pixels[7], 0);
        assert_eq!(&pixels[8..12], &[0, 104, 55, 255]);
    }

    #[test]
    fn test_hex() {
        assert_eq!(RDYLGN[0].to_hex(), "#a50026");
    }
}
