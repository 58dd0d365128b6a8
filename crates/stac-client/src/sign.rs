//! Asset URL signing.
//!
//! Catalog assets on Azure Blob Storage are private; reading them requires a
//! short-lived SAS token appended to the URL. The Planetary Computer issues
//! one token per collection, valid for roughly an hour.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::{ClientConfig, StacClient};
use crate::error::{Result, StacError};
use crate::item::Item;

/// Default SAS API root of the Planetary Computer.
pub const PLANETARY_COMPUTER_SAS_ROOT: &str = "https://planetarycomputer.microsoft.com/api/sas/v1";

const BLOB_HOST_SUFFIX: &str = ".blob.core.windows.net";

/// Rewrites asset hrefs so they can be read.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign every asset of one item in place.
    async fn sign_item(&self, item: &mut Item) -> Result<()>;

    /// Sign a batch of items in place.
    async fn sign_items(&self, items: &mut [Item]) -> Result<()> {
        for item in items.iter_mut() {
            self.sign_item(item).await?;
        }
        Ok(())
    }
}

/// Leaves hrefs untouched, for public catalogs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

#[async_trait]
impl Signer for NoopSigner {
    async fn sign_item(&self, _item: &mut Item) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "msft:expiry")]
    expiry: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expiry: DateTime<Utc>,
}

/// Signs Azure Blob hrefs with per-collection SAS tokens from the
/// Planetary Computer token endpoint.
pub struct PlanetaryComputerSigner {
    client: StacClient,
    /// Tokens are refreshed once they are this close to expiring.
    refresh_margin: Duration,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl PlanetaryComputerSigner {
    pub fn new(sas_root: impl Into<String>, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: StacClient::new(sas_root, config)?,
            refresh_margin: Duration::from_secs(300),
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Signer against the public Planetary Computer endpoint.
    pub fn planetary_computer(config: ClientConfig) -> Result<Self> {
        Self::new(PLANETARY_COMPUTER_SAS_ROOT, config)
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Token for a collection, from cache while it is still fresh.
    pub async fn token(&self, collection: &str) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        let margin = chrono::Duration::from_std(self.refresh_margin)
            .map_err(|e| StacError::Signing(e.to_string()))?;

        if let Some(cached) = tokens.get(collection) {
            if cached.expiry - margin > Utc::now() {
                return Ok(cached.token.clone());
            }
            debug!(collection = %collection, "Cached token near expiry, refreshing");
        }

        let url = self.client.url(&format!("token/{}", collection));
        let response: TokenResponse = self.client.get_json(&url).await.map_err(|e| {
            StacError::Signing(format!("token request for '{}' failed: {}", collection, e))
        })?;
        if response.token.is_empty() {
            return Err(StacError::Signing(format!(
                "empty token for collection '{}'",
                collection
            )));
        }

        info!(collection = %collection, expiry = %response.expiry, "Acquired SAS token");
        tokens.insert(
            collection.to_string(),
            CachedToken {
                token: response.token.clone(),
                expiry: response.expiry,
            },
        );
        Ok(response.token)
    }
}

/// Whether an href points at Azure Blob Storage and is not yet signed.
fn needs_signing(href: &str) -> bool {
    let url = match Url::parse(href) {
        Ok(url) => url,
        // Relative or local paths are left alone
        Err(_) => return false,
    };
    let on_blob = url
        .host_str()
        .map(|host| host.ends_with(BLOB_HOST_SUFFIX))
        .unwrap_or(false);
    on_blob && !url.query_pairs().any(|(k, _)| k == "sig")
}

/// Append a SAS token as the URL query.
fn append_token(href: &str, token: &str) -> String {
    let token = token.trim_start_matches('?');
    if href.contains('?') {
        format!("{}&{}", href, token)
    } else {
        format!("{}?{}", href, token)
    }
}

#[async_trait]
impl Signer for PlanetaryComputerSigner {
    async fn sign_item(&self, item: &mut Item) -> Result<()> {
        let pending: Vec<String> = item
            .assets
            .iter()
            .filter(|(_, asset)| needs_signing(&asset.href))
            .map(|(key, _)| key.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let collection = item.collection.clone().ok_or_else(|| {
            StacError::Signing(format!("item '{}' has no collection", item.id))
        })?;
        let token = self.token(&collection).await?;

        for key in pending {
            if let Some(asset) = item.assets.get_mut(&key) {
                asset.href = append_token(&asset.href, &token);
            }
        }
        Ok(())
    }
}
