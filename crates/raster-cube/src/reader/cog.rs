//! Cloud Optimized GeoTIFF reader.
//!
//! Reads the georeferencing from the GeoTIFF tags once, then decodes internal
//! tiles (or strips) on demand through a shared tile cache.

use std::io::{Read, Seek};
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use scene_common::{EpsgCode, GeoTransform};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, trace};

use super::{Georeference, PixelWindow, RasterAsset};
use crate::cache::{hash_href, Tile, TileCache};
use crate::error::{redact, CubeError, Result};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;
/// GeoKey value meaning "user defined", i.e. no EPSG code.
const USER_DEFINED: u32 = 32767;

/// Anything the TIFF decoder can read from.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Georeferencing hints from the catalog, used when the file lacks tags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoHints {
    pub crs: Option<EpsgCode>,
    pub transform: Option<GeoTransform>,
}

/// An opened COG.
pub struct CogReader {
    href: String,
    key: u64,
    georef: Georeference,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    decoder: Mutex<Decoder<Box<dyn ReadSeek>>>,
    tiles: Arc<Mutex<TileCache>>,
}

impl CogReader {
    /// Parse the first image directory of `reader`.
    pub fn open(
        href: &str,
        reader: Box<dyn ReadSeek>,
        hints: GeoHints,
        tiles: Arc<Mutex<TileCache>>,
    ) -> Result<Self> {
        let mut decoder = Decoder::new(reader)?;

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(CubeError::UnsupportedLayout {
                    href: redact(href).to_string(),
                    layout: format!("{:?}", other),
                })
            }
        }

        let (width, height) = decoder.dimensions()?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();

        let transform = read_transform(&mut decoder)
            .or(hints.transform)
            .ok_or_else(|| CubeError::MissingGeoreference(redact(href).to_string()))?;
        let crs = read_epsg(&mut decoder)
            .or(hints.crs)
            .ok_or_else(|| CubeError::MissingGeoreference(redact(href).to_string()))?;
        let nodata = decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        let georef = Georeference {
            crs,
            transform,
            width: width as usize,
            height: height as usize,
            nodata,
        };
        debug!(
            href = %redact(href),
            width = width,
            height = height,
            crs = %crs,
            chunk_width = chunk_width,
            chunk_height = chunk_height,
            nodata = ?nodata,
            "Opened COG"
        );

        let chunk_width = chunk_width.max(1) as usize;
        Ok(Self {
            href: href.to_string(),
            key: hash_href(href),
            chunks_across: (width as usize + chunk_width - 1) / chunk_width,
            chunk_width,
            chunk_height: chunk_height.max(1) as usize,
            georef,
            decoder: Mutex::new(decoder),
            tiles,
        })
    }

    /// Decoded chunk `index`, from cache when present.
    fn tile(&self, index: u32) -> Result<Arc<Tile>> {
        let key = (self.key, index);
        if let Some(tile) = self.lock_tiles()?.get(&key) {
            return Ok(tile);
        }

        let tile = {
            let mut decoder = self
                .decoder
                .lock()
                .map_err(|_| CubeError::read_failed(&self.href, "decoder lock poisoned"))?;
            let (data_width, data_height) = decoder.chunk_data_dimensions(index);
            let raw = decoder.read_chunk(index)?;
            let data = to_f32(raw, self.georef.nodata);

            // Edge chunks may come back trimmed or padded to the full chunk
            let data_width = data_width as usize;
            let stride = if data.len() == data_width * data_height as usize {
                data_width
            } else {
                self.chunk_width
            };
            Arc::new(Tile {
                width: stride,
                height: data.len() / stride.max(1),
                data,
            })
        };
        trace!(href = %redact(&self.href), chunk = index, "Decoded chunk");

        self.lock_tiles()?.insert(key, Arc::clone(&tile));
        Ok(tile)
    }

    fn lock_tiles(&self) -> Result<std::sync::MutexGuard<'_, TileCache>> {
        self.tiles
            .lock()
            .map_err(|_| CubeError::read_failed(&self.href, "tile cache lock poisoned"))
    }
}

impl RasterAsset for CogReader {
    fn georeference(&self) -> &Georeference {
        &self.georef
    }

    fn read_window(&self, window: &PixelWindow) -> Result<Array2<f32>> {
        let mut out = Array2::from_elem((window.height, window.width), f32::NAN);
        if window.width == 0 || window.height == 0 {
            return Ok(out);
        }
        if window.col + window.width > self.georef.width
            || window.row + window.height > self.georef.height
        {
            return Err(CubeError::read_failed(
                &self.href,
                format!("window {:?} outside raster", window),
            ));
        }

        let first_tx = window.col / self.chunk_width;
        let last_tx = (window.col + window.width - 1) / self.chunk_width;
        let first_ty = window.row / self.chunk_height;
        let last_ty = (window.row + window.height - 1) / self.chunk_height;

        for ty in first_ty..=last_ty {
            for tx in first_tx..=last_tx {
                let index = (ty * self.chunks_across + tx) as u32;
                let tile = self.tile(index)?;

                let tile_col0 = tx * self.chunk_width;
                let tile_row0 = ty * self.chunk_height;
                let col_start = window.col.max(tile_col0);
                let col_end = (window.col + window.width).min(tile_col0 + self.chunk_width);
                let row_start = window.row.max(tile_row0);
                let row_end = (window.row + window.height)
                    .min(tile_row0 + self.chunk_height)
                    .min(tile_row0 + tile.height);

                for row in row_start..row_end {
                    for col in col_start..col_end.min(tile_col0 + tile.width) {
                        out[[row - window.row, col - window.col]] =
                            tile.get(col - tile_col0, row - tile_row0);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Geotransform from `ModelTransformationTag`, or tiepoint plus pixel scale.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return Some(GeoTransform {
                a: m[0],
                b: m[1],
                c: m[3],
                d: m[4],
                e: m[5],
                f: m[7],
            });
        }
    }

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .ok()?;
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .ok()?;
    if tiepoint.len() < 6 || scale.len() < 2 {
        return None;
    }

    // Tiepoint: raster (i, j, k) maps to model (x, y, z)
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);
    Some(GeoTransform {
        a: sx,
        b: 0.0,
        c: x - i * sx,
        d: 0.0,
        e: -sy,
        f: y + j * sy,
    })
}

/// EPSG code from the GeoKey directory.
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<EpsgCode> {
    let keys = decoder
        .get_tag_u32_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let count = keys[3] as usize;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Only inline SHORT values carry EPSG codes
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_KEY => return Some(EpsgCode(value)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(EpsgCode(value)),
            _ => {}
        }
    }
    geographic
}

/// Convert decoded samples to f32 with nodata as NaN.
fn to_f32(raw: DecodingResult, nodata: Option<f64>) -> Vec<f32> {
    let data: Vec<f32> = match raw {
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    };

    match nodata {
        Some(nd) => {
            let nd = nd as f32;
            data.into_iter()
                .map(|x| if x == nd { f32::NAN } else { x })
                .collect()
        }
        None => data,
    }
}
