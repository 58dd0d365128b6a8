//! Standalone Leaflet page showing an index overlay over OpenStreetMap.

use projection::Transformer;
use scene_common::{AreaOfInterest, BoundingBox, EpsgCode, GridSpec};
use serde_json::json;

use crate::error::RenderResult;
use crate::gradient::ColorRamp;

const LEAFLET_VERSION: &str = "1.9.4";
const OSM_TILES: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

/// Points per edge when projecting grid bounds to WGS84.
const BOUNDS_DENSIFY: usize = 21;

/// Grid extent as `(min_lon, min_lat, max_lon, max_lat)`.
///
/// These are the exact overlay corners only for a Web Mercator grid. Any
/// other grid is rotated inside this box; see [`crate::warp_to_web_mercator`].
pub fn wgs84_bounds(grid: &GridSpec) -> RenderResult<BoundingBox> {
    let to_wgs84 = Transformer::new(grid.crs, EpsgCode::WGS84)?;
    Ok(to_wgs84.transform_bbox(&grid.bounds(), BOUNDS_DENSIFY)?)
}

/// Everything placed on the map.
#[derive(Debug, Clone)]
pub struct MapOverlay {
    pub title: String,
    /// Overlay image path, relative to the HTML file.
    pub image_href: String,
    /// Overlay extent in WGS84. The image must be on a Web Mercator grid
    /// with this extent to line up with the basemap.
    pub bounds: BoundingBox,
    pub opacity: f32,
    pub aoi: Option<AreaOfInterest>,
    /// Ramp shown as a legend, with its value range.
    pub legend: Option<ColorRamp>,
}

impl MapOverlay {
    pub fn new(title: impl Into<String>, image_href: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            title: title.into(),
            image_href: image_href.into(),
            bounds,
            opacity: 0.7,
            aoi: None,
            legend: None,
        }
    }

    pub fn with_aoi(mut self, aoi: AreaOfInterest) -> Self {
        self.aoi = Some(aoi);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_legend(mut self, ramp: ColorRamp) -> Self {
        self.legend = Some(ramp);
        self
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn legend_html(ramp: &ColorRamp) -> String {
    let (min, max) = ramp.range();
    let span = (max - min).max(f32::EPSILON);
    let stops: Vec<String> = ramp
        .stops()
        .iter()
        .map(|(v, c)| format!("{} {:.1}%", c.to_hex(), (v - min) / span * 100.0))
        .collect();
    format!(
        r#"<div class="legend"><div class="bar" style="background: linear-gradient(to right, {});"></div><span>{}</span><span style="float: right">{}</span></div>"#,
        stops.join(", "),
        min,
        max
    )
}

/// The complete HTML document.
pub fn render_map_html(overlay: &MapOverlay) -> String {
    let b = &overlay.bounds;
    // Leaflet takes [lat, lon]
    let bounds = json!([[b.min_y, b.min_x], [b.max_y, b.max_x]]);
    let image_href = json!(overlay.image_href);
    let aoi_layer = overlay
        .aoi
        .as_ref()
        .map(|aoi| {
            let latlngs: Vec<[f64; 2]> = aoi.ring().iter().map(|&(lon, lat)| [lat, lon]).collect();
            format!(
                "L.polygon({}, {{color: '#2c7fb8', weight: 2, fill: false}}).addTo(map).bindTooltip('Area of interest');\n",
                json!(latlngs)
            )
        })
        .unwrap_or_default();
    let legend = overlay.legend.as_ref().map(legend_html).unwrap_or_default();
    let title = escape_html(&overlay.title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@{version}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{version}/dist/leaflet.js"></script>
<style>
html, body, #map {{ height: 100%; margin: 0; }}
.title {{ position: absolute; top: 10px; left: 60px; z-index: 1000; background: white; padding: 4px 8px; font: 14px sans-serif; border-radius: 4px; }}
.legend {{ position: absolute; bottom: 20px; left: 10px; z-index: 1000; background: white; padding: 6px; font: 12px sans-serif; width: 220px; border-radius: 4px; }}
.legend .bar {{ height: 12px; margin-bottom: 2px; }}
</style>
</head>
<body>
<div id="map"></div>
<div class="title">{title}</div>
{legend}
<script>
var bounds = {bounds};
var map = L.map('map');
L.tileLayer('{tiles}', {{maxZoom: 19, attribution: '{attribution}'}}).addTo(map);
L.imageOverlay({image_href}, bounds, {{opacity: {opacity}}}).addTo(map);
{aoi_layer}map.fitBounds(bounds);
</script>
</body>
</html>
"#,
        title = title,
        version = LEAFLET_VERSION,
        legend = legend,
        bounds = bounds,
        tiles = OSM_TILES,
        attribution = OSM_ATTRIBUTION,
        image_href = image_href,
        opacity = overlay.opacity,
        aoi_layer = aoi_layer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use projection::mercator;
    use scene_common::GeoTransform;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("NDVI <2020> & \"x\""), "NDVI &lt;2020&gt; &amp; &quot;x&quot;");
    }

    #[test]
    fn test_wgs84_bounds_of_utm_grid() {
        // ~10 km square near 123W 47.7N
        let grid = GridSpec::new(
            EpsgCode(32610),
            GeoTransform::north_up(500_000.0, 5_290_000.0, 10.0),
            1000,
            1000,
        );
        let b = wgs84_bounds(&grid).unwrap();
        assert_abs_diff_eq!(b.min_x, -123.0, epsilon = 0.01);
        assert!(b.max_x > b.min_x && b.max_y > b.min_y);
        assert_abs_diff_eq!(b.max_y - b.min_y, 0.09, epsilon = 0.01);
    }

    #[test]
    fn test_wgs84_bounds_of_mercator_grid_are_its_corners() {
        let (x0, y0) = mercator::forward(-122.1, 47.7);
        let (x1, y1) = mercator::forward(-121.9, 47.6);
        let grid = GridSpec::new(
            EpsgCode::WEB_MERCATOR,
            GeoTransform {
                a: (x1 - x0) / 200.0,
                b: 0.0,
                c: x0,
                d: 0.0,
                e: (y1 - y0) / 150.0,
                f: y0,
            },
            200,
            150,
        );
        let b = wgs84_bounds(&grid).unwrap();
        assert_abs_diff_eq!(b.min_x, -122.1, epsilon = 1e-9);
        assert_abs_diff_eq!(b.max_x, -121.9, epsilon = 1e-9);
        assert_abs_diff_eq!(b.min_y, 47.6, epsilon = 1e-9);
        assert_abs_diff_eq!(b.max_y, 47.7, epsilon = 1e-9);
    }

    #[test]
    fn test_html_has_layers() {
        let overlay = MapOverlay::new("NDVI", "ndvi.png", BoundingBox::new(-122.1, 47.6, -121.9, 47.8))
            .with_opacity(0.6);
        let html = render_map_html(&overlay);
        assert!(html.contains("L.imageOverlay(\"ndvi.png\", bounds, {opacity: 0.6})"));
        assert!(html.contains("var bounds = [[47.6,-122.1],[47.8,-121.9]];"));
        assert!(html.contains("tile.openstreetmap.org"));
        assert!(!html.contains("L.polygon"));
    }
}
