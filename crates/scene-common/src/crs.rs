//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An EPSG code understood by the pipeline.
///
/// Sentinel-2 assets are delivered in WGS84 / UTM zones (EPSG:326xx north,
/// EPSG:327xx south); areas of interest are always WGS84 (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpsgCode(pub u32);

/// Hemisphere of a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    North,
    South,
}

impl EpsgCode {
    /// WGS84 Geographic (lon/lat in degrees)
    pub const WGS84: EpsgCode = EpsgCode(4326);
    /// Web Mercator (meters)
    pub const WEB_MERCATOR: EpsgCode = EpsgCode(3857);

    /// Parse "EPSG:32610", "epsg:4326", "CRS:84" or a bare number.
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Self::WGS84);
        }
        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        let code: u32 = digits
            .parse()
            .map_err(|_| CrsParseError::InvalidFormat(s.to_string()))?;
        let epsg = EpsgCode(code);
        if epsg.is_geographic() || epsg == Self::WEB_MERCATOR || epsg.utm_zone().is_some() {
            Ok(epsg)
        } else {
            Err(CrsParseError::UnsupportedCrs(s.to_string()))
        }
    }

    /// UTM zone for a WGS84 UTM code.
    pub fn utm_zone(&self) -> Option<(u8, Hemisphere)> {
        match self.0 {
            32601..=32660 => Some(((self.0 - 32600) as u8, Hemisphere::North)),
            32701..=32760 => Some(((self.0 - 32700) as u8, Hemisphere::South)),
            _ => None,
        }
    }

    /// WGS84 UTM code for a zone.
    pub fn from_utm_zone(zone: u8, hemisphere: Hemisphere) -> Self {
        match hemisphere {
            Hemisphere::North => EpsgCode(32600 + zone as u32),
            Hemisphere::South => EpsgCode(32700 + zone as u32),
        }
    }

    /// UTM zone covering a WGS84 position (standard 6° zones, no Norway/Svalbard exceptions).
    pub fn utm_for_lonlat(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i64).clamp(0, 59) as u8 + 1;
        let hemisphere = if lat >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        };
        Self::from_utm_zone(zone, hemisphere)
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        self.0 == 4326
    }
}

impl fmt::Display for EpsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for EpsgCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Invalid CRS format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
