//! Test data generators for synthetic reflectance rasters.
//!
//! These generators create predictable, verifiable patterns, plus a small
//! GeoTIFF writer so raster readers can be exercised without network access.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::TiffResult;

/// Creates deterministic Sentinel-2-like reflectance values (scaled by
/// 10000, so 1..=4000) with roughly one pixel in `nodata_every` set to 0.
pub fn create_reflectance_grid(
    width: usize,
    height: usize,
    seed: u32,
    nodata_every: u32,
) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            if nodata_every > 0 && hash % nodata_every == 0 {
                data.push(0);
            } else {
                data.push(1 + (hash % 4000) as u16);
            }
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Creates RGBA pixel data for a simple gradient test pattern.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}

/// Georeferencing of a synthetic single-band GeoTIFF.
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffSpec {
    pub width: u32,
    pub height: u32,
    /// Upper-left corner in CRS units
    pub origin: (f64, f64),
    /// Pixel size in CRS units
    pub resolution: f64,
    pub epsg: u16,
    pub nodata: Option<u16>,
    /// Rows per strip; strips become the decoder's chunks
    pub rows_per_strip: u32,
}

impl GeoTiffSpec {
    /// A 10 m UTM raster with nodata 0, the Sentinel-2 L2A layout.
    pub fn sentinel(width: u32, height: u32, origin: (f64, f64), epsg: u16) -> Self {
        Self {
            width,
            height,
            origin,
            resolution: 10.0,
            epsg,
            nodata: Some(0),
            rows_per_strip: 16,
        }
    }

    fn geo_keys(&self) -> Vec<u16> {
        let geographic = self.epsg == 4326;
        let model_type = if geographic { 2 } else { 1 };
        let crs_key = if geographic { 2048 } else { 3072 };
        vec![
            1, 1, 0, 3, // header: version, revision, minor, key count
            1024, 0, 1, model_type, // GTModelTypeGeoKey
            1025, 0, 1, 1, // GTRasterTypeGeoKey = PixelIsArea
            crs_key, 0, 1, self.epsg,
        ]
    }
}

/// Write a single-band u16 GeoTIFF.
pub fn write_geotiff_to<W: Write + Seek>(
    writer: W,
    spec: &GeoTiffSpec,
    data: &[u16],
) -> TiffResult<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray16>(spec.width, spec.height)?;
    image.rows_per_strip(spec.rows_per_strip)?;

    let scale = [spec.resolution, spec.resolution, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, spec.origin.0, spec.origin.1, 0.0];
    let geo_keys = spec.geo_keys();
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(33550), &scale[..])?;
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(33922), &tiepoint[..])?;
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(34735), &geo_keys[..])?;
    if let Some(nodata) = spec.nodata {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(42113), nodata.to_string().as_str())?;
    }

    image.write_data(data)
}

/// Write a single-band u16 GeoTIFF to `path`.
pub fn write_geotiff(path: &Path, spec: &GeoTiffSpec, data: &[u16]) -> TiffResult<()> {
    let file = File::create(path)?;
    write_geotiff_to(BufWriter::new(file), spec, data)
}
