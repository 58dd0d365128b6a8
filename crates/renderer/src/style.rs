//! Style configuration for rendered outputs.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::gradient::{Color, ColorRamp};

/// Color stop for an index ramp
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColorStop {
    pub value: f32,
    /// `#rrggbb`
    pub color: String,
}

/// How outputs are drawn. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Lower percentile mapped to black in the true-colour stretch.
    pub stretch_low: f64,
    /// Upper percentile mapped to full intensity.
    pub stretch_high: f64,
    /// Custom index ramp; RdYlGn over [-1, 1] when empty.
    pub index_stops: Vec<ColorStop>,
    /// Opacity of the index overlay on the web map.
    pub overlay_opacity: f32,
    pub chart_width: u32,
    pub chart_height: u32,
    /// Line color of the time-series chart.
    pub chart_color: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            stretch_low: 2.0,
            stretch_high: 98.0,
            index_stops: Vec::new(),
            overlay_opacity: 0.7,
            chart_width: 900,
            chart_height: 450,
            chart_color: "#1a9850".to_string(),
        }
    }
}

impl RenderStyle {
    pub fn validate(&self) -> RenderResult<()> {
        if !(0.0..100.0).contains(&self.stretch_low)
            || !(self.stretch_low < self.stretch_high && self.stretch_high <= 100.0)
        {
            return Err(RenderError::Style(format!(
                "stretch percentiles must satisfy 0 <= low < high <= 100, got {} / {}",
                self.stretch_low, self.stretch_high
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(RenderError::Style(format!(
                "overlay_opacity {} outside [0, 1]",
                self.overlay_opacity
            )));
        }
        if self.chart_width < 100 || self.chart_height < 100 {
            return Err(RenderError::Style("chart must be at least 100x100".into()));
        }
        self.chart_rgb()?;
        self.index_ramp()?;
        Ok(())
    }

    /// Ramp for index images.
    pub fn index_ramp(&self) -> RenderResult<ColorRamp> {
        if self.index_stops.is_empty() {
            return Ok(ColorRamp::rdylgn());
        }
        let mut stops = self
            .index_stops
            .iter()
            .map(|s| {
                hex_to_rgb(&s.color)
                    .map(|(r, g, b)| (s.value, Color::rgb(r, g, b)))
                    .ok_or_else(|| RenderError::Style(format!("bad color '{}'", s.color)))
            })
            .collect::<RenderResult<Vec<_>>>()?;
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        ColorRamp::new(stops)
    }

    pub fn chart_rgb(&self) -> RenderResult<(u8, u8, u8)> {
        hex_to_rgb(&self.chart_color)
            .ok_or_else(|| RenderError::Style(format!("bad chart color '{}'", self.chart_color)))
    }
}

/// Parse hex color string to RGB
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#FF0000"), Some((255, 0, 0)));
        assert_eq!(hex_to_rgb("#00FF00"), Some((0, 255, 0)));
        assert_eq!(hex_to_rgb("1a9850"), Some((26, 152, 80)));
        assert_eq!(hex_to_rgb("#GGGGGG"), None);
        assert_eq!(hex_to_rgb("#FFF"), None);
    }

    #[test]
    fn test_defaults_valid() {
        let style = RenderStyle::default();
        assert!(style.validate().is_ok());
        assert_eq!(style.index_ramp().unwrap(), ColorRamp::rdylgn());
    }

    #[test]
    fn test_custom_stops_sorted() {
        let style = RenderStyle {
            index_stops: vec![
                ColorStop { value: 1.0, color: "#00ff00".into() },
                ColorStop { value: 0.0, color: "#ff0000".into() },
            ],
            ..RenderStyle::default()
        };
        let ramp = style.index_ramp().unwrap();
        assert_eq!(ramp.range(), (0.0, 1.0));
        assert_eq!(ramp.color(0.0), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_invalid_style() {
        let bad_stretch = RenderStyle {
            stretch_low: 98.0,
            stretch_high: 2.0,
            ..RenderStyle::default()
        };
        assert!(bad_stretch.validate().is_err());

        let bad_color = RenderStyle {
            chart_color: "green".into(),
            ..RenderStyle::default()
        };
        assert!(bad_color.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let style: RenderStyle = serde_json::from_str(r#"{"overlay_opacity": 0.5}"#).unwrap();
        assert_eq!(style.overlay_opacity, 0.5);
        assert_eq!(style.stretch_high, 98.0);
    }
}
