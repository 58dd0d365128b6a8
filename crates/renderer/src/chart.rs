//! SVG line chart of an index time series.

use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use raster_cube::TimeSeries;

use crate::error::{RenderError, RenderResult};
use crate::style::RenderStyle;

fn chart_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Chart(e.to_string())
}

/// Draw mean index against acquisition date.
///
/// Scenes without valid pixels are left out of the line. Fails with
/// [`RenderError::Empty`] when no scene has a mean.
pub fn render_timeseries_svg(
    series: &TimeSeries,
    title: &str,
    y_label: &str,
    style: &RenderStyle,
) -> RenderResult<String> {
    let points: Vec<(DateTime<Utc>, f64)> = series.valid_points().collect();
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(RenderError::Empty("time series has no valid points".into()));
    };

    // Pad so single points and flat lines still get an axis
    let x_range = (first.0 - Duration::days(3))..(last.0 + Duration::days(3));
    let (y_min, y_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
    let pad = ((y_max - y_min) * 0.1).max(0.05);
    let y_range = (y_min - pad).max(-1.0)..(y_max + pad).min(1.0);

    let (r, g, b) = style.chart_rgb()?;
    let line_color = RGBColor(r, g, b);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (style.chart_width, style.chart_height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 20))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(8)
            .x_label_formatter(&|d| d.format("%Y-%m-%d").to_string())
            .y_label_formatter(&|v| format!("{:.2}", v))
            .y_desc(y_label)
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), line_color.stroke_width(2)))
            .map_err(chart_err)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(t, v)| Circle::new((t, v), 4, line_color.filled())),
            )
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}
