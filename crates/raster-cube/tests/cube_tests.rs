//! End-to-end cube tests over GeoTIFF files on disk.
//!
//! Scenes are written as strip-organized GeoTIFFs covering the Redmond AOI,
//! one of them in the neighbouring UTM zone, then read back through
//! `CogSource` exactly as remote COGs would be.

use std::path::Path;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use projection::Transformer;
use raster_cube::{
    build_pool, mean_index_series, median_composite, ndvi, AssetRef, CogSource, CubeBuilder,
    CubeConfig, CubeError, PixelWindow, RasterCube, RasterSource,
};
use scene_common::{AreaOfInterest, BoundingBox, EpsgCode, GridSpec};
use stac_client::Item;
use test_utils::{
    aoi, crs, require_test_file, stac_item, temp_test_dir, write_geotiff, GeoTiffSpec,
};

const RESOLUTION: f64 = 60.0;
const MARGIN: f64 = 600.0;

struct SceneFiles {
    id: &'static str,
    datetime: &'static str,
    epsg: u32,
    red: u16,
    nir: u16,
}

const SCENES: [SceneFiles; 3] = [
    SceneFiles { id: "late", datetime: "2020-08-20T19:03:21Z", epsg: crs::UTM_10N, red: 2000, nir: 3000 },
    SceneFiles { id: "early", datetime: "2020-06-01T18:59:19Z", epsg: crs::UTM_10N, red: 1000, nir: 3000 },
    SceneFiles { id: "east", datetime: "2020-07-11T19:03:19Z", epsg: crs::UTM_11N, red: 3000, nir: 3000 },
];

fn redmond() -> AreaOfInterest {
    let (w, s, e, n) = aoi::REDMOND_BBOX;
    AreaOfInterest::from_bbox(BoundingBox::new(w, s, e, n)).unwrap()
}

fn config() -> CubeConfig {
    CubeConfig {
        resolution: RESOLUTION,
        chunk_size: 48,
        workers: 2,
        ..CubeConfig::default()
    }
}

/// Items whose assets point at `dir/{id}_{band}.tif`.
fn items(dir: &Path) -> Vec<Item> {
    SCENES
        .iter()
        .map(|s| {
            let red = dir.join(format!("{}_B04.tif", s.id));
            let nir = dir.join(format!("{}_B08.tif", s.id));
            let value = stac_item(
                s.id,
                s.datetime,
                Some(5.0),
                s.epsg,
                (0.0, 0.0),
                &[("B04", red.to_str().unwrap()), ("B08", nir.to_str().unwrap())],
            );
            serde_json::from_value(value).unwrap()
        })
        .collect()
}

/// Constant-valued rasters covering `grid` plus a margin, in each scene's CRS.
fn write_scenes(dir: &Path, grid: &GridSpec) {
    for s in &SCENES {
        let epsg = EpsgCode(s.epsg);
        let bounds: BoundingBox = Transformer::new(grid.crs, epsg)
            .unwrap()
            .transform_bbox(&grid.bounds(), 21)
            .unwrap();
        let width = ((bounds.width() + 2.0 * MARGIN) / RESOLUTION).ceil() as u32;
        let height = ((bounds.height() + 2.0 * MARGIN) / RESOLUTION).ceil() as u32;
        let mut spec = GeoTiffSpec::sentinel(
            width,
            height,
            (bounds.min_x - MARGIN, bounds.max_y + MARGIN),
            s.epsg as u16,
        );
        spec.resolution = RESOLUTION;

        for (band, value) in [("B04", s.red), ("B08", s.nir)] {
            let data = vec![value; (width * height) as usize];
            write_geotiff(&dir.join(format!("{}_{}.tif", s.id, band)), &spec, &data).unwrap();
        }
    }
}

fn build_cube(dir: &Path, source: Arc<dyn RasterSource>) -> RasterCube {
    let config = config();
    CubeBuilder::from_config(redmond(), vec!["B04".into(), "B08".into()], &config)
        .build(&items(dir), source)
        .unwrap()
}

#[test]
fn test_cube_uses_majority_crs_and_time_order() {
    let dir = temp_test_dir();
    let cube = build_cube(dir.path(), Arc::new(CogSource::new(config())));

    assert_eq!(cube.grid().crs, EpsgCode(32610));
    let ids: Vec<&str> = cube.scenes().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["early", "east", "late"]);
    let [t, b, h, w] = cube.shape();
    assert_eq!((t, b), (3, 2));
    assert!(h > 100 && w > 100, "{}x{}", w, h);
    assert!(cube.chunk_windows().len() > 4);
}

#[test]
fn test_median_composite_across_zones() {
    let dir = temp_test_dir();
    let source = Arc::new(CogSource::new(config()));
    let cube = build_cube(dir.path(), source.clone());
    write_scenes(dir.path(), cube.grid());

    let pool = build_pool(2).unwrap();
    let composite = median_composite(&cube, &pool).unwrap();

    let red = composite.band("B04").unwrap();
    assert_eq!(red.dim(), (cube.grid().height, cube.grid().width));
    // Median of 1000, 3000 (reprojected from zone 11) and 2000
    assert!(red.iter().all(|&v| v == 2000.0));
    assert!(composite.band("B08").unwrap().iter().all(|&v| v == 3000.0));

    let index = ndvi(&composite).unwrap();
    assert_eq!(index.valid_count(), cube.grid().len());
    assert_abs_diff_eq!(index.mean().unwrap(), 0.2, epsilon = 1e-6);

    let stats = source.cache_stats();
    assert!(stats.misses > 0);
    assert!(stats.entries > 0);
}

#[test]
fn test_time_series_over_aoi() {
    let dir = temp_test_dir();
    let cube = build_cube(dir.path(), Arc::new(CogSource::new(config())));
    write_scenes(dir.path(), cube.grid());

    let pool = build_pool(2).unwrap();
    let series = mean_index_series(&cube, "B08", "B04", &pool).unwrap();

    assert_eq!(series.len(), 3);
    let means: Vec<f64> = series.points.iter().map(|p| p.mean.unwrap()).collect();
    assert_abs_diff_eq!(means[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(means[1], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(means[2], 0.2, epsilon = 1e-6);
    for point in &series.points {
        assert_eq!(point.valid_fraction, 1.0);
    }
}

#[test]
fn test_nodata_pixels_fall_back_to_other_scenes() {
    let dir = temp_test_dir();
    let cube = build_cube(dir.path(), Arc::new(CogSource::new(config())));
    write_scenes(dir.path(), cube.grid());

    // Overwrite the earliest red band with nodata everywhere
    let grid = *cube.grid();
    let bounds = grid.bounds();
    let width = ((bounds.width() + 2.0 * MARGIN) / RESOLUTION).ceil() as u32;
    let height = ((bounds.height() + 2.0 * MARGIN) / RESOLUTION).ceil() as u32;
    let mut spec = GeoTiffSpec::sentinel(
        width,
        height,
        (bounds.min_x - MARGIN, bounds.max_y + MARGIN),
        crs::UTM_10N as u16,
    );
    spec.resolution = RESOLUTION;
    write_geotiff(
        &dir.path().join("early_B04.tif"),
        &spec,
        &vec![0u16; (width * height) as usize],
    )
    .unwrap();

    let pool = build_pool(2).unwrap();
    let composite = median_composite(&cube, &pool).unwrap();
    // Median of the remaining 3000 and 2000
    assert!(composite.band("B04").unwrap().iter().all(|&v| v == 2500.0));
}

#[test]
fn test_missing_file_fails_materialization() {
    let dir = temp_test_dir();
    let cube = build_cube(dir.path(), Arc::new(CogSource::new(config())));

    let pool = build_pool(1).unwrap();
    let err = median_composite(&cube, &pool).unwrap_err();
    assert!(matches!(err, CubeError::OpenFailed { .. }), "{:?}", err);
}

#[test]
fn test_real_sentinel_tile() {
    let path = require_test_file!("T10TET_20200601_B04.tif");
    let source = CogSource::new(CubeConfig::default());
    let asset = source
        .open(&AssetRef::new(path.to_string_lossy()))
        .unwrap();

    let georef = asset.georeference();
    assert_eq!(georef.crs, EpsgCode(crs::UTM_10N));
    assert_eq!((georef.width, georef.height), (10980, 10980));
    assert_eq!(georef.nodata, Some(0.0));

    let window = PixelWindow { col: 4096, row: 4096, width: 256, height: 256 };
    let data = asset.read_window(&window).unwrap();
    assert_eq!(data.dim(), (256, 256));
    assert!(data.iter().all(|v| v.is_nan() || (*v > 0.0 && *v < 20_000.0)));
}
