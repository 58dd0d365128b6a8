//! Common test fixtures for scene-composite tests.
//!
//! Pre-defined areas, time windows and STAC documents that mirror what the
//! Planetary Computer returns for Sentinel-2 L2A searches.

use serde_json::{json, Value};

/// Areas as `(min_lon, min_lat, max_lon, max_lat)` or rings.
pub mod aoi {
    /// Small agricultural area east of Redmond, WA (UTM zone 10N)
    pub const REDMOND_BBOX: (f64, f64, f64, f64) = (-122.05, 47.65, -121.95, 47.72);

    /// Ring with only two distinct vertices
    pub const DEGENERATE_RING: [(f64, f64); 3] = [(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
}

/// Common time values for testing.
pub mod time {
    /// Summer 2020 search window, as written on the command line
    pub const SUMMER_2020: &str = "2020-06-01/2020-08-31";

    /// Acquisition timestamps in search order (not sorted)
    pub const ACQUISITIONS: [&str; 4] = [
        "2020-07-11T19:03:19Z",
        "2020-06-01T18:59:19Z",
        "2020-08-20T19:03:21Z",
        "2020-06-26T19:03:21Z",
    ];
}

/// Sentinel-2 L2A band asset keys.
pub mod bands {
    pub const BLUE: &str = "B02";
    pub const GREEN: &str = "B03";
    pub const RED: &str = "B04";
    pub const NIR: &str = "B08";

    /// Default band list of the pipeline
    pub const DEFAULT: [&str; 4] = [BLUE, GREEN, RED, NIR];
}

/// CRS identifiers used in fixtures.
pub mod crs {
    pub const UTM_10N: u32 = 32610;
    pub const UTM_11N: u32 = 32611;
}

/// Build a STAC item document.
///
/// `assets` maps asset keys to hrefs. Every asset gets `proj:epsg` and a
/// 10 m `proj:transform` anchored at `origin`.
pub fn stac_item(
    id: &str,
    datetime: &str,
    cloud_cover: Option<f64>,
    epsg: u32,
    origin: (f64, f64),
    assets: &[(&str, &str)],
) -> Value {
    let mut asset_map = serde_json::Map::new();
    for (key, href) in assets {
        asset_map.insert(
            key.to_string(),
            json!({
                "href": href,
                "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                "roles": ["data"],
                "proj:epsg": epsg,
                "proj:transform": [10.0, 0.0, origin.0, 0.0, -10.0, origin.1],
            }),
        );
    }

    let mut properties = serde_json::Map::new();
    properties.insert("datetime".into(), json!(datetime));
    properties.insert("proj:epsg".into(), json!(epsg));
    properties.insert("platform".into(), json!("Sentinel-2B"));
    if let Some(cover) = cloud_cover {
        properties.insert("eo:cloud_cover".into(), json!(cover));
    }

    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "collection": "sentinel-2-l2a",
        "bbox": [-122.5, 47.3, -121.0, 48.3],
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[-122.5, 47.3], [-121.0, 47.3], [-121.0, 48.3], [-122.5, 48.3], [-122.5, 47.3]]]
        },
        "properties": properties,
        "assets": asset_map,
        "links": []
    })
}

/// Build a search result page, optionally with a `rel="next"` link.
pub fn item_collection(features: Vec<Value>, next: Option<Value>) -> Value {
    let mut links = vec![json!({"rel": "self", "href": "https://example.com/search"})];
    if let Some(next) = next {
        links.push(next);
    }
    json!({
        "type": "FeatureCollection",
        "features": features,
        "links": links,
    })
}

/// A `rel="next"` link that POSTs a merged body carrying `token`.
pub fn post_next_link(href: &str, token: &str) -> Value {
    json!({
        "rel": "next",
        "href": href,
        "method": "POST",
        "body": {"token": token},
        "merge": true
    })
}

/// Planetary Computer SAS token response.
pub fn sas_token(token: &str, expiry: &str) -> Value {
    json!({"msft:expiry": expiry, "token": token})
}
