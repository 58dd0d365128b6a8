//! Command-line flags. Every flag overrides the matching config file value.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scene_common::{AreaOfInterest, BoundingBox};

use crate::config::{PipelineConfig, SigningMode};

/// Median composite and NDVI from a STAC catalog
#[derive(Parser, Debug, Default)]
#[command(name = "scene-composite")]
#[command(about = "Cloud-free median composite, NDVI map and NDVI time series from STAC scenes")]
pub struct Args {
    /// Pipeline config file (YAML)
    #[arg(short, long, env = "COMPOSITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// STAC API root
    #[arg(long, env = "STAC_API_URL")]
    pub stac_url: Option<String>,

    /// Collection to search
    #[arg(long, env = "STAC_COLLECTION")]
    pub collection: Option<String>,

    /// Acquisition interval, e.g. 2020-06-01/2020-08-31
    #[arg(long)]
    pub datetime: Option<String>,

    /// AOI as min_lon,min_lat,max_lon,max_lat (replaces the config polygon)
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// Maximum cloud cover in percent
    #[arg(long)]
    pub max_cloud: Option<f64>,

    /// Comma-separated asset keys to load
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<String>>,

    /// Output pixel size in metres
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Chunk edge length in pixels
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Worker threads for chunk reads
    #[arg(long, env = "CUBE_WORKERS")]
    pub workers: Option<usize>,

    /// Target CRS EPSG code (defaults to the most common item CRS)
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Stop after this many search results
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Directory for rendered outputs
    #[arg(short, long, env = "COMPOSITE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Use asset hrefs without requesting SAS tokens
    #[arg(long)]
    pub no_sign: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Load the config file (or defaults) and apply flag overrides.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(url) = &self.stac_url {
            config.catalog.url = url.clone();
        }
        if let Some(collection) = &self.collection {
            config.catalog.collection = collection.clone();
        }
        if let Some(datetime) = &self.datetime {
            config.area.datetime = datetime.clone();
        }
        if let Some(bbox) = &self.bbox {
            let bbox = BoundingBox::from_csv(bbox)
                .with_context(|| format!("Invalid --bbox '{}'", bbox))?;
            let aoi = AreaOfInterest::from_bbox(bbox).context("Invalid --bbox area")?;
            config.area.polygon = aoi.into();
        }
        if let Some(max_cloud) = self.max_cloud {
            config.area.max_cloud_cover = max_cloud;
        }
        if let Some(bands) = &self.bands {
            config.bands = bands.iter().map(|b| b.trim().to_string()).collect();
        }
        if let Some(resolution) = self.resolution {
            config.cube.resolution = resolution;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.cube.chunk_size = chunk_size;
        }
        if let Some(workers) = self.workers {
            config.cube.workers = workers;
        }
        if self.epsg.is_some() {
            config.target_epsg = self.epsg;
        }
        if self.max_items.is_some() {
            config.catalog.max_items = self.max_items;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.no_sign {
            config.catalog.signing = SigningMode::None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("scene-composite").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--collection",
            "landsat-c2-l2",
            "--bbox",
            "-122.1,47.6,-122.0,47.7",
            "--bands",
            "B04,B08",
            "--resolution",
            "20",
            "--no-sign",
            "--output-dir",
            "/tmp/composite",
        ]);
        let mut config = PipelineConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.catalog.collection, "landsat-c2-l2");
        assert_eq!(config.bands, vec!["B04", "B08"]);
        assert_eq!(config.cube.resolution, 20.0);
        assert_eq!(config.catalog.signing, SigningMode::None);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/composite"));
        assert_eq!(config.area.polygon.first(), Some(&[-122.1, 47.6]));
        assert_eq!(config.area.polygon.len(), 5);
        // Untouched values keep their defaults
        assert_eq!(config.area.max_cloud_cover, 25.0);
        assert_eq!(config.cube.chunk_size, 2048);
    }

    #[test]
    fn test_negative_bbox_is_a_value() {
        // South-western hemisphere, every coordinate negative
        let args = parse(&["--bbox", "-58.5,-34.7,-58.3,-34.5", "--no-sign"]);
        assert_eq!(args.bbox.as_deref(), Some("-58.5,-34.7,-58.3,-34.5"));
        assert!(args.no_sign);

        let mut config = PipelineConfig::default();
        args.apply(&mut config).unwrap();
        assert_eq!(config.area.polygon[2], [-58.3, -34.5]);
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_bbox() {
        let args = parse(&["--bbox", "-122.1,47.6"]);
        assert!(args.apply(&mut PipelineConfig::default()).is_err());
    }
}
