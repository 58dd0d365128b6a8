//! Spherical (Web) Mercator, EPSG:3857.

use std::f64::consts::PI;

/// Earth radius used by Web Mercator (meters)
const EARTH_RADIUS: f64 = 6_378_137.0;
/// Latitude limit of the square Web Mercator world
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic (lon, lat in degrees) to Web Mercator (x, y in meters).
///
/// Latitudes are clamped to the Web Mercator limit.
pub fn forward(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = EARTH_RADIUS * lon_deg.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
    (x, y)
}

/// Web Mercator (x, y in meters) to geographic (lon, lat in degrees).
pub fn inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_edge() {
        let (x, y) = forward(180.0, MAX_LATITUDE);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!((y - 20_037_508.342_789_244).abs() < 1e-3);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = forward(-122.33, 47.61);
        let (lon, lat) = inverse(x, y);
        assert!((lon + 122.33).abs() < 1e-9);
        assert!((lat - 47.61).abs() < 1e-9);
    }
}
