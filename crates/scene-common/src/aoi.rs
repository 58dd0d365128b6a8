//! Area of interest: a WGS84 polygon and its bounding box.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{BoundingBox, SceneError, SceneResult};

/// A closed polygon ring in longitude/latitude plus its bounding box.
///
/// The ring is stored closed (first vertex repeated at the end). Once built
/// the area is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct AreaOfInterest {
    ring: Vec<(f64, f64)>,
    bbox: BoundingBox,
}

impl AreaOfInterest {
    /// Build an area from an ordered sequence of `(lon, lat)` vertices.
    ///
    /// An open ring is closed automatically.
    pub fn from_ring(mut ring: Vec<(f64, f64)>) -> SceneResult<Self> {
        if let Some(&(lon, lat)) = ring
            .iter()
            .find(|(lon, lat)| !lon.is_finite() || !lat.is_finite())
        {
            return Err(SceneError::InvalidAoi(format!(
                "non-finite vertex ({}, {})",
                lon, lat
            )));
        }
        if let Some(&(lon, lat)) = ring
            .iter()
            .find(|(lon, lat)| lon.abs() > 180.0 || lat.abs() > 90.0)
        {
            return Err(SceneError::InvalidAoi(format!(
                "vertex ({}, {}) outside WGS84 range",
                lon, lat
            )));
        }

        if ring.first() != ring.last() {
            if let Some(&first) = ring.first() {
                ring.push(first);
            }
        }

        let mut distinct: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
        for &vertex in &ring[..ring.len().saturating_sub(1)] {
            if !distinct.contains(&vertex) {
                distinct.push(vertex);
            }
        }
        if distinct.len() < 3 {
            return Err(SceneError::InvalidAoi(format!(
                "polygon needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }

        let bbox = BoundingBox::from_points(ring.iter().copied())
            .ok_or_else(|| SceneError::InvalidAoi("empty ring".to_string()))?;
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(SceneError::InvalidAoi("polygon has zero area".to_string()));
        }

        Ok(Self { ring, bbox })
    }

    /// Rectangular area covering a bounding box.
    pub fn from_bbox(bbox: BoundingBox) -> SceneResult<Self> {
        Self::from_ring(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ])
    }

    /// Parse a GeoJSON Polygon geometry or a Feature wrapping one.
    ///
    /// Only the exterior ring is used.
    pub fn from_geojson(value: &Value) -> SceneResult<Self> {
        let geometry = match value.get("type").and_then(Value::as_str) {
            Some("Feature") => value
                .get("geometry")
                .ok_or_else(|| SceneError::InvalidAoi("feature without geometry".to_string()))?,
            Some("Polygon") => value,
            Some(other) => {
                return Err(SceneError::InvalidAoi(format!(
                    "unsupported GeoJSON type '{}'",
                    other
                )))
            }
            None => return Err(SceneError::InvalidAoi("missing GeoJSON type".to_string())),
        };

        let exterior = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .and_then(|rings| rings.first())
            .and_then(Value::as_array)
            .ok_or_else(|| SceneError::InvalidAoi("missing polygon coordinates".to_string()))?;

        let ring = exterior
            .iter()
            .map(|pair| {
                let lon = pair.get(0).and_then(Value::as_f64);
                let lat = pair.get(1).and_then(Value::as_f64);
                match (lon, lat) {
                    (Some(lon), Some(lat)) => Ok((lon, lat)),
                    _ => Err(SceneError::InvalidAoi(format!("bad position {}", pair))),
                }
            })
            .collect::<SceneResult<Vec<_>>>()?;

        Self::from_ring(ring)
    }

    /// GeoJSON Polygon geometry for this area.
    pub fn to_geojson(&self) -> Value {
        let coords: Vec<[f64; 2]> = self.ring.iter().map(|&(x, y)| [x, y]).collect();
        json!({
            "type": "Polygon",
            "coordinates": [coords],
        })
    }

    /// Closed exterior ring.
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Point-in-polygon test (even-odd rule).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bbox.contains_point(lon, lat) {
            return false;
        }

        let mut inside = false;
        for edge in self.ring.windows(2) {
            let (x1, y1) = edge[0];
            let (x2, y2) = edge[1];
            if (y1 > lat) != (y2 > lat) {
                let x_cross = x1 + (lat - y1) / (y2 - y1) * (x2 - x1);
                if lon < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

impl TryFrom<Vec<[f64; 2]>> for AreaOfInterest {
    type Error = SceneError;

    fn try_from(value: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::from_ring(value.into_iter().map(|[x, y]| (x, y)).collect())
    }
}

impl From<AreaOfInterest> for Vec<[f64; 2]> {
    fn from(aoi: AreaOfInterest) -> Self {
        aoi.ring.into_iter().map(|(x, y)| [x, y]).collect()
    }
}
