//! scene-composite
//!
//! Searches a STAC catalog, builds a cloud-free median composite over an
//! area of interest and renders true colour, NDVI and NDVI-over-time outputs.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use composite::{pipeline, Args};

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.log_json {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    if let Err(e) = run(args).await {
        error!("Pipeline failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;
    info!(
        collection = %config.catalog.collection,
        datetime = %config.area.datetime,
        bands = ?config.bands,
        resolution = config.cube.resolution,
        workers = config.cube.workers,
        output_dir = %config.output_dir.display(),
        "Starting scene composite"
    );

    let outputs = pipeline::run(&config).await?;

    info!(path = %outputs.items.display(), "Wrote item summaries");
    info!(path = %outputs.true_color.display(), "Wrote true colour image");
    info!(path = %outputs.ndvi.display(), "Wrote NDVI image");
    info!(path = %outputs.map.display(), "Wrote NDVI map");
    info!(path = %outputs.map_overlay.display(), "Wrote NDVI map overlay");
    if let Some(path) = &outputs.timeseries {
        info!(path = %path.display(), "Wrote NDVI time series");
    }
    Ok(())
}
