//! HTTP plumbing shared by search and signing: one pooled client, JSON
//! decoding with URL context, and retry with exponential backoff.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, StacError};

/// Configuration for catalog HTTP access.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

/// A STAC API endpoint.
#[derive(Debug, Clone)]
pub struct StacClient {
    http: Client,
    root: String,
    config: ClientConfig,
}

impl StacClient {
    /// Create a client for the API rooted at `root`
    /// (e.g. `https://planetarycomputer.microsoft.com/api/stac/v1`).
    pub fn new(root: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let root = root.into().trim_end_matches('/').to_string();
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            return Err(StacError::InvalidUrl(root));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { http, root, config })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute URL for a path below the API root.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute_json(url, || self.http.get(url)).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute_json(url, || self.http.post(url).json(body)).await
    }

    /// Send a request, retrying transient failures with exponential backoff.
    async fn execute_json<T, F>(&self, url: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.execute_once(url, build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry_count < self.config.max_retries => {
                    retry_count += 1;
                    warn!(
                        url = %url,
                        error = %e,
                        retry = retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.max_retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_once<T: DeserializeOwned>(&self, url: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(url = %url, status = status.as_u16(), bytes = text.len(), "Catalog response");

        if !status.is_success() {
            return Err(StacError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text.chars().take(512).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| StacError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
