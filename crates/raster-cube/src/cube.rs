//! The lazy `{time, band, y, x}` raster cube.
//!
//! Building a cube only decides the common grid and records which asset
//! backs each `(time, band)` slice. Pixels are fetched when a chunk is read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use projection::Transformer;
use scene_common::{AreaOfInterest, EpsgCode, GridSpec};
use stac_client::Item;
use tracing::{debug, info, warn};

use crate::config::CubeConfig;
use crate::error::{CubeError, Result};
use crate::reader::{AssetRef, GeoHints, PixelWindow, RasterSource};

/// Intermediate points per edge when reprojecting the AOI bounds.
const BBOX_DENSIFY: usize = 21;

/// A spatial chunk of the cube grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

/// One time slice of the cube.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// One entry per cube band; `None` where the item lacks the asset.
    pub assets: Vec<Option<AssetRef>>,
}

/// Lazy 4-D cube. Every slice shares one grid.
pub struct RasterCube {
    grid: GridSpec,
    bands: Vec<String>,
    scenes: Vec<Scene>,
    chunk_size: usize,
    aoi: Option<AreaOfInterest>,
    source: Arc<dyn RasterSource>,
}

impl std::fmt::Debug for RasterCube {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterCube")
            .field("grid", &self.grid)
            .field("bands", &self.bands)
            .field("scenes", &self.scenes.len())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl RasterCube {
    /// Assemble a cube from already-resolved scenes.
    pub fn new(
        grid: GridSpec,
        bands: Vec<String>,
        mut scenes: Vec<Scene>,
        chunk_size: usize,
        source: Arc<dyn RasterSource>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CubeError::Config("chunk_size must be > 0".to_string()));
        }
        if grid.is_empty() {
            return Err(CubeError::Config(format!(
                "empty grid {}x{}",
                grid.width, grid.height
            )));
        }
        if let Some(bad) = scenes.iter().find(|s| s.assets.len() != bands.len()) {
            return Err(CubeError::Config(format!(
                "scene {} has {} assets for {} bands",
                bad.id,
                bad.assets.len(),
                bands.len()
            )));
        }

        // Stable: equal timestamps keep their given order
        scenes.sort_by_key(|s| s.datetime);
        Ok(Self {
            grid,
            bands,
            scenes,
            chunk_size,
            aoi: None,
            source,
        })
    }

    /// Restrict AOI-aware reductions (the time series) to a polygon.
    pub fn with_aoi(mut self, aoi: AreaOfInterest) -> Self {
        self.aoi = Some(aoi);
        self
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn aoi(&self) -> Option<&AreaOfInterest> {
        self.aoi.as_ref()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Capture times, oldest first.
    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.scenes.iter().map(|s| s.datetime).collect()
    }

    /// `[time, band, y, x]`
    pub fn shape(&self) -> [usize; 4] {
        [
            self.scenes.len(),
            self.bands.len(),
            self.grid.height,
            self.grid.width,
        ]
    }

    pub fn band_index(&self, band: &str) -> Result<usize> {
        self.bands
            .iter()
            .position(|b| b == band)
            .ok_or_else(|| CubeError::UnknownBand(band.to_string()))
    }

    /// Spatial chunk windows in row-major order; edge chunks are smaller.
    pub fn chunk_windows(&self) -> Vec<ChunkWindow> {
        let mut windows = Vec::new();
        for row in (0..self.grid.height).step_by(self.chunk_size) {
            for col in (0..self.grid.width).step_by(self.chunk_size) {
                windows.push(ChunkWindow {
                    col,
                    row,
                    width: self.chunk_size.min(self.grid.width - col),
                    height: self.chunk_size.min(self.grid.height - row),
                });
            }
        }
        windows
    }

    /// Materialize one `(time, band)` chunk as `(rows, cols)`.
    ///
    /// Each target pixel centre is mapped into the asset's CRS and sampled
    /// from the nearest source pixel. Pixels outside the asset are NaN.
    pub fn read_chunk(&self, time: usize, band: usize, window: &ChunkWindow) -> Result<Array2<f32>> {
        let mut out = Array2::from_elem((window.height, window.width), f32::NAN);
        let scene = self
            .scenes
            .get(time)
            .ok_or_else(|| CubeError::Config(format!("time index {} out of range", time)))?;
        let asset_ref = match scene.assets.get(band) {
            Some(Some(asset_ref)) => asset_ref,
            Some(None) => return Ok(out),
            None => return Err(CubeError::UnknownBand(format!("#{}", band))),
        };

        let asset = self.source.open(asset_ref)?;
        let georef = *asset.georeference();
        let to_source = Transformer::new(self.grid.crs, georef.crs)?;

        // Source pixel for every target pixel, plus their bounding window
        let mut samples: Vec<Option<(usize, usize)>> = Vec::with_capacity(window.width * window.height);
        let (mut min_col, mut min_row) = (usize::MAX, usize::MAX);
        let (mut max_col, mut max_row) = (0usize, 0usize);
        for r in 0..window.height {
            for c in 0..window.width {
                let (x, y) = self.grid.pixel_center(window.col + c, window.row + r);
                let source_pixel = to_source
                    .transform(x, y)
                    .ok()
                    .and_then(|(sx, sy)| georef.transform.invert(sx, sy))
                    .and_then(|(fc, fr)| {
                        let inside = fc >= 0.0
                            && fr >= 0.0
                            && fc < georef.width as f64
                            && fr < georef.height as f64;
                        inside.then(|| (fc.floor() as usize, fr.floor() as usize))
                    });
                if let Some((sc, sr)) = source_pixel {
                    min_col = min_col.min(sc);
                    max_col = max_col.max(sc);
                    min_row = min_row.min(sr);
                    max_row = max_row.max(sr);
                }
                samples.push(source_pixel);
            }
        }

        if min_col == usize::MAX {
            debug!(scene = %scene.id, band = %self.bands[band], "Chunk outside asset footprint");
            return Ok(out);
        }

        let source_window = PixelWindow {
            col: min_col,
            row: min_row,
            width: max_col - min_col + 1,
            height: max_row - min_row + 1,
        };
        let block = asset.read_window(&source_window)?;

        for (i, sample) in samples.into_iter().enumerate() {
            if let Some((sc, sr)) = sample {
                out[[i / window.width, i % window.width]] = block[[sr - min_row, sc - min_col]];
            }
        }
        Ok(out)
    }

    /// Materialize a whole `(time, band)` slice on the calling thread.
    pub fn read_slice(&self, time: usize, band: usize) -> Result<Array2<f32>> {
        let mut out = Array2::from_elem((self.grid.height, self.grid.width), f32::NAN);
        for window in self.chunk_windows() {
            let chunk = self.read_chunk(time, band, &window)?;
            out.slice_mut(ndarray::s![
                window.row..window.row + window.height,
                window.col..window.col + window.width
            ])
            .assign(&chunk);
        }
        Ok(out)
    }
}

/// Builds a [`RasterCube`] from catalog items.
#[derive(Debug, Clone)]
pub struct CubeBuilder {
    aoi: AreaOfInterest,
    bands: Vec<String>,
    resolution: f64,
    chunk_size: usize,
    crs: Option<EpsgCode>,
}

impl CubeBuilder {
    pub fn new(aoi: AreaOfInterest, bands: Vec<String>) -> Self {
        let defaults = CubeConfig::default();
        Self {
            aoi,
            bands,
            resolution: defaults.resolution,
            chunk_size: defaults.chunk_size,
            crs: None,
        }
    }

    /// Builder with resolution and chunk size from `config`.
    pub fn from_config(aoi: AreaOfInterest, bands: Vec<String>, config: &CubeConfig) -> Self {
        Self::new(aoi, bands)
            .resolution(config.resolution)
            .chunk_size(config.chunk_size)
    }

    pub fn resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Force the target CRS instead of the items' most common one.
    pub fn crs(mut self, crs: Option<EpsgCode>) -> Self {
        self.crs = crs;
        self
    }

    pub fn build(self, items: &[Item], source: Arc<dyn RasterSource>) -> Result<RasterCube> {
        if self.bands.is_empty() {
            return Err(CubeError::Config("no bands requested".to_string()));
        }

        let crs = match self.crs {
            Some(crs) => crs,
            None => most_common_epsg(items).ok_or(CubeError::NoTargetCrs)?,
        };
        let to_target = Transformer::new(EpsgCode::WGS84, crs)?;
        let bounds = to_target.transform_bbox(&self.aoi.bbox(), BBOX_DENSIFY)?;
        let grid = GridSpec::covering(crs, &bounds, self.resolution)?;

        let mut scenes = Vec::with_capacity(items.len());
        for item in items {
            let Some(datetime) = item.datetime() else {
                warn!(item = %item.id, "Skipping item without datetime");
                continue;
            };
            let assets = self
                .bands
                .iter()
                .map(|band| match item.assets.get(band) {
                    Some(asset) => Some(AssetRef {
                        href: asset.href.clone(),
                        hints: GeoHints {
                            crs: item.epsg(band),
                            transform: item.transform(band),
                        },
                    }),
                    None => {
                        warn!(item = %item.id, band = %band, "Item has no asset for band, slice will be empty");
                        None
                    }
                })
                .collect();
            scenes.push(Scene {
                id: item.id.clone(),
                datetime,
                assets,
            });
        }
        if scenes.is_empty() {
            return Err(CubeError::NoItems);
        }

        let cube = RasterCube::new(grid, self.bands, scenes, self.chunk_size, source)?
            .with_aoi(self.aoi);
        let [t, b, h, w] = cube.shape();
        info!(
            crs = %crs,
            times = t,
            bands = b,
            height = h,
            width = w,
            chunks = cube.chunk_windows().len(),
            "Built raster cube"
        );
        Ok(cube)
    }
}

/// The most frequent item CRS; ties go to the lowest code.
pub fn most_common_epsg(items: &[Item]) -> Option<EpsgCode> {
    let mut counts: HashMap<EpsgCode, usize> = HashMap::new();
    for code in items.iter().filter_map(Item::item_epsg) {
        *counts.entry(code).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_code, a_n), (b_code, b_n)| a_n.cmp(b_n).then(b_code.0.cmp(&a_code.0)))
        .map(|(code, _)| code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{Georeference, RasterAsset};
    use scene_common::{BoundingBox, GeoTransform};

    /// Asset whose pixel value encodes its own position.
    struct Synthetic {
        georef: Georeference,
    }

    impl RasterAsset for Synthetic {
        fn georeference(&self) -> &Georeference {
            &self.georef
        }

        fn read_window(&self, w: &PixelWindow) -> Result<Array2<f32>> {
            Ok(Array2::from_shape_fn((w.height, w.width), |(r, c)| {
                ((w.row + r) * 1000 + (w.col + c)) as f32
            }))
        }
    }

    struct SyntheticSource(Georeference);

    impl RasterSource for SyntheticSource {
        fn open(&self, _asset: &AssetRef) -> Result<Arc<dyn RasterAsset>> {
            Ok(Arc::new(Synthetic { georef: self.0 }))
        }
    }

    fn utm_grid(width: usize, height: usize) -> GridSpec {
        GridSpec::new(
            EpsgCode(32610),
            GeoTransform::north_up(500_000.0, 5_280_000.0, 10.0),
            width,
            height,
        )
    }

    fn source() -> Arc<dyn RasterSource> {
        Arc::new(SyntheticSource(Georeference {
            crs: EpsgCode(32610),
            transform: GeoTransform::north_up(499_980.0, 5_280_040.0, 10.0),
            width: 100,
            height: 100,
            nodata: None,
        }))
    }

    fn scene(id: &str, day: u32, bands: usize) -> Scene {
        Scene {
            id: id.to_string(),
            datetime: format!("2020-06-{:02}T19:00:00Z", day).parse().unwrap(),
            assets: (0..bands).map(|_| Some(AssetRef::new("mem://a"))).collect(),
        }
    }

    #[test]
    fn test_chunk_windows_cover_grid() {
        let cube = RasterCube::new(utm_grid(10, 7), vec!["B04".into()], vec![], 4, source()).unwrap();
        let windows = cube.chunk_windows();
        assert_eq!(windows.len(), 6);
        let covered: usize = windows.iter().map(|w| w.width * w.height).sum();
        assert_eq!(covered, 70);
        assert_eq!(windows[5], ChunkWindow { col: 8, row: 4, width: 2, height: 3 });
    }

    #[test]
    fn test_scenes_sorted_by_time() {
        let scenes = vec![scene("late", 20, 1), scene("early", 2, 1), scene("mid", 10, 1)];
        let cube = RasterCube::new(utm_grid(4, 4), vec!["B04".into()], scenes, 4, source()).unwrap();
        let ids: Vec<&str> = cube.scenes().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
        assert_eq!(cube.shape(), [3, 1, 4, 4]);
    }

    #[test]
    fn test_read_chunk_same_crs_offsets() {
        // Target origin is 2 columns right and 4 rows down of the source origin
        let cube =
            RasterCube::new(utm_grid(5, 5), vec!["B04".into()], vec![scene("a", 1, 1)], 5, source())
                .unwrap();
        let chunk = cube
            .read_chunk(0, 0, &ChunkWindow { col: 0, row: 0, width: 5, height: 5 })
            .unwrap();
        assert_eq!(chunk[[0, 0]], 4002.0);
        assert_eq!(chunk[[1, 3]], 5005.0);
    }

    #[test]
    fn test_read_chunk_outside_footprint_is_nan() {
        let far = GridSpec::new(
            EpsgCode(32610),
            GeoTransform::north_up(700_000.0, 5_280_000.0, 10.0),
            3,
            3,
        );
        let cube = RasterCube::new(far, vec!["B04".into()], vec![scene("a", 1, 1)], 3, source()).unwrap();
        let chunk = cube
            .read_chunk(0, 0, &ChunkWindow { col: 0, row: 0, width: 3, height: 3 })
            .unwrap();
        assert!(chunk.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_missing_asset_gives_nan_slice() {
        let mut s = scene("a", 1, 2);
        s.assets[1] = None;
        let cube = RasterCube::new(
            utm_grid(3, 3),
            vec!["B04".into(), "B08".into()],
            vec![s],
            3,
            source(),
        )
        .unwrap();
        assert!(cube.read_slice(0, 1).unwrap().iter().all(|v| v.is_nan()));
        assert!(cube.read_slice(0, 0).unwrap().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_mismatched_assets_rejected() {
        let err = RasterCube::new(
            utm_grid(3, 3),
            vec!["B04".into(), "B08".into()],
            vec![scene("a", 1, 1)],
            3,
            source(),
        )
        .unwrap_err();
        assert!(matches!(err, CubeError::Config(_)));
    }

    #[test]
    fn test_builder_grid_covers_aoi() {
        let aoi = AreaOfInterest::from_bbox(BoundingBox::new(-122.05, 47.65, -121.95, 47.72)).unwrap();
        let item: Item = serde_json::from_value(serde_json::json!({
            "id": "a",
            "geometry": null,
            "properties": {"datetime": "2020-06-01T18:59:19Z", "proj:epsg": 32610},
            "assets": {"B04": {"href": "mem://a"}}
        }))
        .unwrap();

        let cube = CubeBuilder::new(aoi.clone(), vec!["B04".into(), "B08".into()])
            .chunk_size(256)
            .build(&[item], source())
            .unwrap();

        let grid = cube.grid();
        assert_eq!(grid.crs, EpsgCode(32610));
        assert_eq!(grid.transform.c % 10.0, 0.0);
        assert_eq!(grid.transform.f % 10.0, 0.0);
        // ~7.5 km x ~7.8 km at 10 m
        assert!(grid.width > 700 && grid.width < 800, "width {}", grid.width);
        assert!(grid.height > 750 && grid.height < 830, "height {}", grid.height);
        assert!(cube.scenes()[0].assets[1].is_none());

        let to_utm = Transformer::new(EpsgCode::WGS84, EpsgCode(32610)).unwrap();
        for &(lon, lat) in aoi.ring() {
            let (x, y) = to_utm.transform(lon, lat).unwrap();
            assert!(grid.bounds().contains_point(x, y));
        }
    }

    #[test]
    fn test_builder_without_crs_fails() {
        let aoi = AreaOfInterest::from_bbox(BoundingBox::new(-122.05, 47.65, -121.95, 47.72)).unwrap();
        let item: Item = serde_json::from_value(serde_json::json!({
            "id": "a",
            "geometry": null,
            "properties": {"datetime": "2020-06-01T18:59:19Z"},
            "assets": {}
        }))
        .unwrap();
        let err = CubeBuilder::new(aoi, vec!["B04".into()])
            .build(&[item], source())
            .unwrap_err();
        assert!(matches!(err, CubeError::NoTargetCrs));
    }

    #[test]
    fn test_most_common_epsg_tie_breaks_low() {
        let item = |id: &str, epsg: u32| -> Item {
            serde_json::from_value(serde_json::json!({
                "id": id,
                "geometry": null,
                "properties": {"proj:epsg": epsg},
                "assets": {}
            }))
            .unwrap()
        };
        let items = vec![item("a", 32611), item("b", 32610), item("c", 32611), item("d", 32610)];
        assert_eq!(most_common_epsg(&items), Some(EpsgCode(32610)));
        assert_eq!(most_common_epsg(&items[..3]), Some(EpsgCode(32611)));
        assert_eq!(most_common_epsg(&[]), None);
    }
}
