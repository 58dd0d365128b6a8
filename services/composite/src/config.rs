//! Pipeline configuration.
//!
//! Loaded from a YAML file with `${VAR}` / `${VAR:-default}` substitution;
//! every field has a default reproducing the original Redmond NDVI study.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use raster_cube::{CubeConfig, NIR_BAND, RED_BAND};
use renderer::{RenderStyle, TRUE_COLOR_BANDS};
use scene_common::{AreaOfInterest, DateRange, EpsgCode};
use serde::{Deserialize, Serialize};
use stac_client::{ClientConfig, PLANETARY_COMPUTER_SAS_ROOT};

pub const PLANETARY_COMPUTER_STAC: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub catalog: CatalogConfig,
    pub area: AreaConfig,
    /// Asset keys loaded into the cube.
    pub bands: Vec<String>,
    /// Force the cube CRS instead of the most common item CRS.
    pub target_epsg: Option<u32>,
    pub cube: CubeConfig,
    pub render: RenderStyle,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            area: AreaConfig::default(),
            bands: ["B02", "B03", "B04", "B08"].iter().map(|b| b.to_string()).collect(),
            target_epsg: None,
            cube: CubeConfig::default(),
            render: RenderStyle::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningMode {
    /// Planetary Computer SAS tokens.
    PlanetaryComputer,
    /// Public assets, hrefs used as-is.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub url: String,
    pub collection: String,
    pub signing: SigningMode,
    pub sas_url: String,
    /// Items per search page.
    pub page_size: u32,
    pub max_items: Option<usize>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: PLANETARY_COMPUTER_STAC.to_string(),
            collection: "sentinel-2-l2a".to_string(),
            signing: SigningMode::PlanetaryComputer,
            sas_url: PLANETARY_COMPUTER_SAS_ROOT.to_string(),
            page_size: 100,
            max_items: None,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Polygon as `[lon, lat]` pairs.
    pub polygon: Vec<[f64; 2]>,
    /// ISO 8601 interval, `start/end`.
    pub datetime: String,
    /// Maximum `eo:cloud_cover` in percent.
    pub max_cloud_cover: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            // Farmland east of Redmond, WA
            polygon: vec![
                [-122.05, 47.65],
                [-121.95, 47.65],
                [-121.95, 47.72],
                [-122.05, 47.72],
                [-122.05, 47.65],
            ],
            datetime: "2020-06-01/2020-08-31".to_string(),
            max_cloud_cover: 25.0,
        }
    }
}

impl PipelineConfig {
    /// Load a YAML file, expanding environment variables first.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read pipeline config from {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline config {:?}", path.as_ref()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self =
            serde_yaml::from_str(&expanded).context("Failed to parse pipeline config YAML")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.catalog.collection.is_empty(),
            "Catalog collection cannot be empty"
        );
        anyhow::ensure!(self.catalog.page_size > 0, "page_size must be greater than 0");
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.area.max_cloud_cover),
            "max_cloud_cover must be within 0-100, got {}",
            self.area.max_cloud_cover
        );
        for band in [RED_BAND, NIR_BAND] {
            anyhow::ensure!(
                self.bands.iter().any(|b| b == band),
                "Band {} is required for NDVI",
                band
            );
        }
        for band in TRUE_COLOR_BANDS {
            anyhow::ensure!(
                self.bands.iter().any(|b| b == band),
                "Band {} is required for the true colour image",
                band
            );
        }
        if let Some(code) = self.target_epsg {
            EpsgCode::parse(&code.to_string())
                .with_context(|| format!("Unsupported target_epsg {}", code))?;
        }
        self.aoi()?;
        self.date_range()?;
        self.cube.validate().map_err(anyhow::Error::msg)?;
        self.render.validate()?;
        Ok(())
    }

    pub fn aoi(&self) -> Result<AreaOfInterest> {
        AreaOfInterest::try_from(self.area.polygon.clone()).context("Invalid area polygon")
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::parse(&self.area.datetime)
            .with_context(|| format!("Invalid datetime interval '{}'", self.area.datetime))
    }

    pub fn target_crs(&self) -> Option<EpsgCode> {
        self.target_epsg.map(EpsgCode)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.catalog.timeout_secs),
            max_retries: self.catalog.max_retries,
            ..ClientConfig::default()
        }
    }
}

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }
            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
