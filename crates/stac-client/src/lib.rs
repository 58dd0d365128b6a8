//! Client for STAC (SpatioTemporal Asset Catalog) APIs.
//!
//! Covers the three catalog steps of the compositing pipeline:
//!
//! ```text
//! StacClient::search(params)      POST /search, follow rel="next"
//!      │
//!      ▼
//! filter_by_cloud_cover(items)    drop cloudy / unlabelled scenes
//!      │
//!      ▼
//! Signer::sign_items(items)       append short-lived access tokens
//! ```

pub mod client;
pub mod error;
pub mod filter;
pub mod item;
pub mod search;
pub mod sign;

pub use client::{ClientConfig, StacClient};
pub use error::{Result, StacError};
pub use filter::{filter_by_cloud_cover, sort_by_datetime};
pub use item::{Asset, Item, ItemCollection, ItemSummary, Link};
pub use search::SearchParams;
pub use sign::{NoopSigner, PlanetaryComputerSigner, Signer, PLANETARY_COMPUTER_SAS_ROOT};
