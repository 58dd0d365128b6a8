//! STAC Item, Asset and ItemCollection types.
//!
//! Only the fields the pipeline reads are typed; everything else is kept in
//! `properties` / `extra` so items survive a serialize round trip.
//!
//! See: <https://github.com/radiantearth/stac-spec/blob/master/item-spec/item-spec.md>

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use scene_common::{BoundingBox, EpsgCode, GeoTransform};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `proj:epsg` if present, else a parseable `proj:code`.
fn crs_of(fields: &Map<String, Value>) -> Option<EpsgCode> {
    if let Some(code) = fields.get("proj:epsg").and_then(Value::as_u64) {
        return Some(EpsgCode(code as u32));
    }
    fields
        .get("proj:code")
        .and_then(Value::as_str)
        .and_then(|s| EpsgCode::parse(s).ok())
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

/// A single scene in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type", default = "feature_type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,

    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(default)]
    pub geometry: Option<Value>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Asset key (e.g. "B04") to asset.
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,

    #[serde(default)]
    pub links: Vec<Link>,
}

/// A downloadable file belonging to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Extension fields such as `proj:epsg`, `proj:transform`, `eo:bands`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A link object; `method`/`body`/`merge` carry STAC API paging hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(default)]
    pub merge: bool,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub type_: String,

    #[serde(default)]
    pub features: Vec<Item>,

    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(rename = "numberMatched", default, skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,
}

impl ItemCollection {
    /// The `rel="next"` link, if any.
    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// Compact per-item record written alongside the rendered outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub datetime: Option<DateTime<Utc>>,
    pub cloud_cover: Option<f64>,
    pub epsg: Option<EpsgCode>,
    pub assets: Vec<String>,
}

impl Item {
    /// Capture time: `datetime`, falling back to `start_datetime`.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        ["datetime", "start_datetime"]
            .iter()
            .filter_map(|key| self.properties.get(*key).and_then(Value::as_str))
            .find_map(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `eo:cloud_cover` percentage.
    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.get("eo:cloud_cover").and_then(Value::as_f64)
    }

    /// Footprint bounding box (2D part of `bbox`).
    pub fn footprint(&self) -> Option<BoundingBox> {
        let bbox = self.bbox.as_ref()?;
        match bbox.len() {
            4 => Some(BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3])),
            6 => Some(BoundingBox::new(bbox[0], bbox[1], bbox[3], bbox[4])),
            _ => None,
        }
    }

    /// Look up a projection-extension field on the asset, then on the item.
    fn proj_field(&self, asset_key: &str, field: &str) -> Option<&Value> {
        self.assets
            .get(asset_key)
            .and_then(|asset| asset.extra.get(field))
            .or_else(|| self.properties.get(field))
    }

    /// CRS of an asset from `proj:epsg` or `proj:code`.
    ///
    /// Either field on the asset wins over both fields on the item.
    pub fn epsg(&self, asset_key: &str) -> Option<EpsgCode> {
        self.assets
            .get(asset_key)
            .and_then(|asset| crs_of(&asset.extra))
            .or_else(|| crs_of(&self.properties))
    }

    /// Item-level CRS, used when choosing the cube's target CRS.
    pub fn item_epsg(&self) -> Option<EpsgCode> {
        crs_of(&self.properties).or_else(|| self.assets.keys().find_map(|key| self.epsg(key)))
    }

    /// Affine transform of an asset from `proj:transform`.
    pub fn transform(&self, asset_key: &str) -> Option<GeoTransform> {
        let values: Vec<f64> = self
            .proj_field(asset_key, "proj:transform")?
            .as_array()?
            .iter()
            .filter_map(Value::as_f64)
            .collect();
        GeoTransform::from_stac(&values)
    }

    /// Raster shape `(rows, cols)` of an asset from `proj:shape`.
    pub fn shape(&self, asset_key: &str) -> Option<(usize, usize)> {
        let shape = self.proj_field(asset_key, "proj:shape")?.as_array()?;
        match (
            shape.first().and_then(Value::as_u64),
            shape.get(1).and_then(Value::as_u64),
        ) {
            (Some(rows), Some(cols)) => Some((rows as usize, cols as usize)),
            _ => None,
        }
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id.clone(),
            datetime: self.datetime(),
            cloud_cover: self.cloud_cover(),
            epsg: self.item_epsg(),
            assets: self.assets.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Item {
        serde_json::from_value(json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "S2B_MSIL2A_20200601T185919_R013_T10TET",
            "collection": "sentinel-2-l2a",
            "bbox": [-123.0, 47.0, -122.0, 48.0],
            "geometry": null,
            "properties": {
                "datetime": "2020-06-01T18:59:19.024000Z",
                "eo:cloud_cover": 12.5,
                "proj:epsg": 32610
            },
            "assets": {
                "B04": {
                    "href": "https://example.blob.core.windows.net/b04.tif",
                    "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                    "roles": ["data"],
                    "proj:shape": [10980, 10980],
                    "proj:transform": [10.0, 0.0, 499980.0, 0.0, -10.0, 5300040.0]
                },
                "B01": {
                    "href": "https://example.blob.core.windows.net/b01.tif",
                    "proj:code": "EPSG:32611"
                }
            },
            "links": []
        }))
        .unwrap()
    }

    #[test]
    fn test_typed_accessors() {
        let item = sample();
        assert_eq!(item.cloud_cover(), Some(12.5));
        assert_eq!(item.datetime().unwrap().format("%Y-%m-%d").to_string(), "2020-06-01");
        assert_eq!(item.epsg("B04"), Some(EpsgCode(32610)));
        assert_eq!(item.epsg("B01"), Some(EpsgCode(32611)));
        assert_eq!(item.shape("B04"), Some((10980, 10980)));
        assert_eq!(item.transform("B04").unwrap().c, 499980.0);
        assert!(item.transform("B01").is_none());
        assert_eq!(
            item.footprint(),
            Some(BoundingBox::new(-123.0, 47.0, -122.0, 48.0))
        );
    }

    #[test]
    fn test_asset_proj_code_beats_item_epsg() {
        let mut item = sample();
        item.properties.insert("proj:code".into(), json!("EPSG:32612"));
        // Asset-level proj:code wins over both item-level fields
        assert_eq!(item.epsg("B01"), Some(EpsgCode(32611)));
        // No asset-level CRS, item-level proj:epsg wins over proj:code
        assert_eq!(item.epsg("B04"), Some(EpsgCode(32610)));
        assert_eq!(item.epsg("missing"), Some(EpsgCode(32610)));

        item.properties.remove("proj:epsg");
        assert_eq!(item.epsg("B04"), Some(EpsgCode(32612)));
        assert_eq!(item.item_epsg(), Some(EpsgCode(32612)));

        item.properties.remove("proj:code");
        assert_eq!(item.epsg("B04"), None);
        assert_eq!(item.item_epsg(), Some(EpsgCode(32611)));
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let item = sample();
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["assets"]["B04"]["proj:shape"], json!([10980, 10980]));
        let back: Item = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_summary() {
        let summary = sample().summary();
        assert_eq!(summary.epsg, Some(EpsgCode(32610)));
        assert_eq!(summary.assets, vec!["B01".to_string(), "B04".to_string()]);
    }
}
