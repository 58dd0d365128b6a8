//! `Read + Seek` over an HTTP object using byte-range requests.
//!
//! Reads are served from fixed-size blocks; each block is fetched with one
//! `Range: bytes=start-end` GET and kept in a small LRU so the TIFF decoder's
//! many small header reads don't each cost a round trip.

use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lru::LruCache;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{redact, CubeError, Result};

/// Blocking range reader over one URL.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    len: u64,
    pos: u64,
    block_size: u64,
    max_retries: u32,
    blocks: LruCache<u64, Arc<Vec<u8>>>,
    requests: u64,
}

impl HttpRangeReader {
    /// Open `url`, learning its length from the first block's
    /// `Content-Range` header.
    pub fn open(
        client: Client,
        url: &str,
        block_size: u64,
        cache_blocks: usize,
        max_retries: u32,
    ) -> Result<Self> {
        let capacity = NonZeroUsize::new(cache_blocks.max(1)).unwrap_or(NonZeroUsize::MIN);
        let mut reader = Self {
            client,
            url: url.to_string(),
            len: 0,
            pos: 0,
            block_size: block_size.max(1),
            max_retries,
            blocks: LruCache::new(capacity),
            requests: 0,
        };

        let response = reader
            .get_range(0, reader.block_size - 1)
            .map_err(|e| CubeError::open_failed(url, e.without_url()))?;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let total = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_total)
                    .ok_or_else(|| CubeError::open_failed(url, "missing Content-Range total"))?;
                let bytes = response
                    .bytes()
                    .map_err(|e| CubeError::open_failed(url, e.without_url()))?;
                reader.len = total;
                reader.blocks.put(0, Arc::new(bytes.to_vec()));
            }
            StatusCode::OK => {
                // Server ignored the range: keep the whole body as blocks
                let bytes = response
                    .bytes()
                    .map_err(|e| CubeError::open_failed(url, e.without_url()))?;
                reader.len = bytes.len() as u64;
                for (i, block) in bytes.chunks(reader.block_size as usize).enumerate() {
                    reader.blocks.put(i as u64, Arc::new(block.to_vec()));
                }
            }
            status => {
                return Err(CubeError::open_failed(url, format!("HTTP {}", status)));
            }
        }

        debug!(url = %redact(url), len = reader.len, "Opened range reader");
        Ok(reader)
    }

    /// Total object length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of HTTP requests issued so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn get_range(&mut self, start: u64, end: u64) -> reqwest::Result<Response> {
        self.requests += 1;
        self.client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
    }

    fn fetch_block(&mut self, index: u64) -> io::Result<Arc<Vec<u8>>> {
        if let Some(block) = self.blocks.get(&index) {
            return Ok(Arc::clone(block));
        }

        let start = index * self.block_size;
        let end = (start + self.block_size).min(self.len) - 1;
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(200);

        loop {
            let attempt = self
                .get_range(start, end)
                .and_then(|r| r.error_for_status())
                .and_then(|r| {
                    let status = r.status();
                    r.bytes().map(|b| (status, b))
                });

            match attempt {
                Ok((status, bytes)) => {
                    let data = if status == StatusCode::PARTIAL_CONTENT {
                        bytes.to_vec()
                    } else {
                        // Full body: cut out the block ourselves
                        let s = (start as usize).min(bytes.len());
                        let e = ((end + 1) as usize).min(bytes.len());
                        bytes[s..e].to_vec()
                    };
                    let block = Arc::new(data);
                    self.blocks.put(index, Arc::clone(&block));
                    return Ok(block);
                }
                Err(e) if retry_count < self.max_retries && is_transient(&e) => {
                    retry_count += 1;
                    warn!(
                        url = %redact(&self.url),
                        error = %e.without_url(),
                        retry = retry_count,
                        "Range request failed, retrying"
                    );
                    thread::sleep(delay);
                    delay = (delay * 2).min(Duration::from_secs(5));
                }
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e.without_url())),
            }
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        return true;
    }
    err.status()
        .map(|s| s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error())
        .unwrap_or(false)
}

/// Total length from `bytes start-end/total`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

impl Read for HttpRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }

        let index = self.pos / self.block_size;
        let block = self.fetch_block(index)?;
        let offset = (self.pos - index * self.block_size) as usize;
        if offset >= block.len() {
            return Ok(0);
        }

        let n = buf.len().min(block.len() - offset);
        buf[..n].copy_from_slice(&block[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of object",
            )),
        }
    }
}
