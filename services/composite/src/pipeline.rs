//! The compositing run, from catalog search to files on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use raster_cube::{
    build_pool, mean_index_series, median_composite, ndvi, CogSource, Composite, CubeBuilder,
    IndexGrid, TimeSeries, NIR_BAND, RED_BAND,
};
use renderer::{
    create_png_auto, render_index, render_map_html, render_timeseries_svg, render_true_color,
    warp_to_web_mercator, wgs84_bounds, MapOverlay, RenderError, RenderStyle,
};
use scene_common::AreaOfInterest;
use stac_client::{
    filter_by_cloud_cover, sort_by_datetime, Item, NoopSigner, PlanetaryComputerSigner,
    SearchParams, Signer, StacClient,
};
use tracing::{info, warn};

use crate::config::{PipelineConfig, SigningMode};

pub const ITEMS_FILE: &str = "items.json";
pub const TRUE_COLOR_FILE: &str = "true_color.png";
pub const NDVI_FILE: &str = "ndvi.png";
pub const MAP_FILE: &str = "ndvi_map.html";
/// NDVI resampled to Web Mercator, drawn over the basemap by the map page.
pub const MAP_OVERLAY_FILE: &str = "ndvi_map_overlay.png";
pub const TIMESERIES_FILE: &str = "ndvi_timeseries.svg";

/// Files written by a run.
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub scene_count: usize,
    pub items: PathBuf,
    pub true_color: PathBuf,
    pub ndvi: PathBuf,
    pub map: PathBuf,
    pub map_overlay: PathBuf,
    /// `None` when no scene had valid pixels inside the AOI.
    pub timeseries: Option<PathBuf>,
    pub ndvi_mean: Option<f64>,
}

/// Run the whole pipeline.
pub async fn run(config: &PipelineConfig) -> Result<PipelineOutputs> {
    let started = Instant::now();
    let aoi = config.aoi()?;

    let items = find_items(config, &aoi).await?;
    let scene_count = items.len();

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", config.output_dir))?;
    let items_path = write_item_summaries(&items, &config.output_dir)?;

    let config = config.clone();
    let outputs = tokio::task::spawn_blocking(move || -> Result<PipelineOutputs> {
        let (composite, series) = materialize(&config, &aoi, &items)?;
        let mut outputs = render_outputs(&composite, &series, &aoi, &config.render, &config.output_dir)?;
        outputs.scene_count = scene_count;
        outputs.items = items_path;
        Ok(outputs)
    })
    .await
    .context("Materialization task panicked")??;

    info!(
        scenes = outputs.scene_count,
        ndvi_mean = ?outputs.ndvi_mean,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Pipeline complete"
    );
    Ok(outputs)
}

/// Search, cloud-filter, order and sign the scenes.
pub async fn find_items(config: &PipelineConfig, aoi: &AreaOfInterest) -> Result<Vec<Item>> {
    let catalog = &config.catalog;
    let client = StacClient::new(&catalog.url, config.client_config())
        .with_context(|| format!("Invalid STAC API URL '{}'", catalog.url))?;

    let mut params = SearchParams::new(&catalog.collection)
        .bbox(aoi.bbox())
        .datetime(config.date_range()?)
        .limit(catalog.page_size);
    if let Some(max) = catalog.max_items {
        params = params.max_items(max);
    }

    info!(url = %catalog.url, collection = %catalog.collection, "Searching catalog");
    let found = client
        .search(&params)
        .await
        .with_context(|| format!("Search of '{}' failed", catalog.collection))?;
    let found_count = found.len();

    let mut items = filter_by_cloud_cover(found, config.area.max_cloud_cover);
    info!(
        found = found_count,
        kept = items.len(),
        max_cloud_cover = config.area.max_cloud_cover,
        "Filtered items by cloud cover"
    );
    anyhow::ensure!(
        !items.is_empty(),
        "No scenes of '{}' in {} with cloud cover <= {}% ({} before filtering)",
        catalog.collection,
        config.area.datetime,
        config.area.max_cloud_cover,
        found_count
    );
    sort_by_datetime(&mut items);

    let signer: Box<dyn Signer> = match catalog.signing {
        SigningMode::PlanetaryComputer => Box::new(
            PlanetaryComputerSigner::new(&catalog.sas_url, config.client_config())
                .context("Failed to create asset signer")?,
        ),
        SigningMode::None => Box::new(NoopSigner),
    };
    signer
        .sign_items(&mut items)
        .await
        .context("Failed to sign asset URLs")?;

    Ok(items)
}

fn write_item_summaries(items: &[Item], dir: &Path) -> Result<PathBuf> {
    let summaries: Vec<_> = items.iter().map(Item::summary).collect();
    let path = dir.join(ITEMS_FILE);
    let json = serde_json::to_vec_pretty(&summaries).context("Failed to serialize items")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// Build the cube and reduce it. Blocks on range reads.
pub fn materialize(
    config: &PipelineConfig,
    aoi: &AreaOfInterest,
    items: &[Item],
) -> Result<(Composite, TimeSeries)> {
    let source = Arc::new(CogSource::new(config.cube.clone()));
    let cube = CubeBuilder::from_config(aoi.clone(), config.bands.clone(), &config.cube)
        .crs(config.target_crs())
        .build(items, source.clone())
        .context("Failed to build raster cube")?;

    let [times, bands, height, width] = cube.shape();
    info!(
        crs = %cube.grid().crs,
        times,
        bands,
        width,
        height,
        chunks = cube.chunk_windows().len(),
        "Cube ready"
    );

    let pool = build_pool(config.cube.workers).context("Failed to start worker pool")?;

    let started = Instant::now();
    let composite = median_composite(&cube, &pool).context("Median composite failed")?;
    info!(elapsed_secs = started.elapsed().as_secs_f64(), "Median composite done");

    let series = mean_index_series(&cube, NIR_BAND, RED_BAND, &pool)
        .context("NDVI time series failed")?;

    let stats = source.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        memory_bytes = stats.memory_bytes,
        evictions = stats.evictions,
        "Tile cache"
    );

    Ok((composite, series))
}

/// Render every product of a composite into `dir`.
pub fn render_outputs(
    composite: &Composite,
    series: &TimeSeries,
    aoi: &AreaOfInterest,
    style: &RenderStyle,
    dir: &Path,
) -> Result<PipelineOutputs> {
    let write = |name: &str, bytes: &[u8]| -> Result<PathBuf> {
        let path = dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(path)
    };

    let (pixels, w, h) = render_true_color(composite, style).context("True colour render failed")?;
    let true_color = write(TRUE_COLOR_FILE, &create_png_auto(&pixels, w, h)?)?;

    let index: IndexGrid = ndvi(composite).context("NDVI failed")?;
    let ramp = style.index_ramp()?;
    let (pixels, w, h) = render_index(&index, &ramp);
    let ndvi_path = write(NDVI_FILE, &create_png_auto(&pixels, w, h)?)?;

    let warped = warp_to_web_mercator(&index).context("Failed to resample NDVI for the map")?;
    let (pixels, w, h) = render_index(&warped, &ramp);
    let map_overlay = write(MAP_OVERLAY_FILE, &create_png_auto(&pixels, w, h)?)?;
    let bounds = wgs84_bounds(warped.grid()).context("Failed to project grid bounds")?;
    let overlay = MapOverlay::new("NDVI median composite", MAP_OVERLAY_FILE, bounds)
        .with_opacity(style.overlay_opacity)
        .with_aoi(aoi.clone())
        .with_legend(ramp);
    let map = write(MAP_FILE, render_map_html(&overlay).as_bytes())?;

    let timeseries = match render_timeseries_svg(series, "Mean NDVI over AOI", "NDVI", style) {
        Ok(svg) => Some(write(TIMESERIES_FILE, svg.as_bytes())?),
        Err(RenderError::Empty(reason)) => {
            warn!(reason = %reason, "Skipping time-series chart");
            None
        }
        Err(e) => return Err(e).context("Time-series chart failed"),
    };

    let ndvi_mean = index.mean();
    info!(
        valid_pixels = index.valid_count(),
        ndvi_mean = ?ndvi_mean,
        ndvi_range = ?index.range(),
        "Rendered outputs"
    );

    Ok(PipelineOutputs {
        scene_count: series.len(),
        items: dir.join(ITEMS_FILE),
        true_color,
        ndvi: ndvi_path,
        map,
        map_overlay,
        timeseries,
        ndvi_mean,
    })
}
