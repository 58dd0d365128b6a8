//! Median compositing pipeline over STAC scenes.
//!
//! ```text
//! config.yaml + flags ──► find_items ──► materialize ──► render_outputs
//!                         search         cube, median    PNG, HTML, SVG
//!                         filter, sign   NDVI series
//! ```

pub mod cli;
pub mod config;
pub mod pipeline;

pub use cli::Args;
pub use config::{AreaConfig, CatalogConfig, PipelineConfig, SigningMode};
pub use pipeline::{find_items, materialize, render_outputs, run, PipelineOutputs};
