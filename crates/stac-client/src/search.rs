//! Item search against the STAC API `/search` endpoint.

use scene_common::{BoundingBox, DateRange};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::client::StacClient;
use crate::error::{Result, StacError};
use crate::item::{Item, ItemCollection, Link};

/// Parameters for an item search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Collection ids to search (e.g. `sentinel-2-l2a`)
    pub collections: Vec<String>,
    /// Area filter in WGS84
    pub bbox: Option<BoundingBox>,
    /// Acquisition window
    pub datetime: Option<DateRange>,
    /// Page size requested from the server
    pub limit: u32,
    /// Stop after this many items
    pub max_items: Option<usize>,
}

impl SearchParams {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collections: vec![collection.into()],
            bbox: None,
            datetime: None,
            limit: 100,
            max_items: None,
        }
    }

    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn datetime(mut self, range: DateRange) -> Self {
        self.datetime = Some(range);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// JSON body for `POST /search`.
    pub fn to_body(&self) -> Result<Value> {
        if self.collections.is_empty() {
            return Err(StacError::InvalidSearch("no collections given".to_string()));
        }
        if self.limit == 0 {
            return Err(StacError::InvalidSearch("limit must be positive".to_string()));
        }

        let mut body = Map::new();
        body.insert("collections".to_string(), json!(self.collections));
        body.insert("limit".to_string(), json!(self.limit));
        if let Some(bbox) = &self.bbox {
            body.insert("bbox".to_string(), json!(bbox.to_array()));
        }
        if let Some(range) = &self.datetime {
            body.insert("datetime".to_string(), json!(range.to_stac_interval()));
        }
        Ok(Value::Object(body))
    }
}

/// How to fetch the next page.
#[derive(Debug, Clone, PartialEq)]
enum PageRequest {
    Get(String),
    Post(String, Value),
}

/// Work out the request for a `rel="next"` link.
fn next_request(link: &Link, previous_body: &Value) -> PageRequest {
    let is_post = link
        .method
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(false);
    if !is_post {
        return PageRequest::Get(link.href.clone());
    }

    let body = match (&link.body, link.merge) {
        (Some(Value::Object(extra)), true) => {
            let mut merged = previous_body.as_object().cloned().unwrap_or_default();
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        (Some(body), false) => body.clone(),
        _ => previous_body.clone(),
    };
    PageRequest::Post(link.href.clone(), body)
}

impl StacClient {
    /// Search for items, following pagination links until the results are
    /// exhausted or `max_items` is reached.
    #[instrument(skip(self, params), fields(collections = ?params.collections))]
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Item>> {
        let body = params.to_body()?;
        let mut request = PageRequest::Post(self.url("search"), body);
        let mut items: Vec<Item> = Vec::new();
        let mut page = 0usize;

        loop {
            page += 1;
            let collection: ItemCollection = match &request {
                PageRequest::Get(url) => self.get_json(url).await?,
                PageRequest::Post(url, body) => self.post_json(url, body).await?,
            };

            let received = collection.features.len();
            debug!(
                page = page,
                received = received,
                matched = ?collection.number_matched,
                "Search page"
            );
            items.extend(collection.features.iter().cloned());

            if let Some(max) = params.max_items {
                if items.len() >= max {
                    items.truncate(max);
                    break;
                }
            }
            if received == 0 {
                break;
            }

            let previous_body = match &request {
                PageRequest::Post(_, body) => body.clone(),
                PageRequest::Get(_) => Value::Null,
            };
            match collection.next_link() {
                Some(link) => {
                    let next = next_request(link, &previous_body);
                    if next == request {
                        // Server keeps handing back the same page
                        break;
                    }
                    request = next;
                }
                None => break,
            }
        }

        info!(items = items.len(), pages = page, "Catalog search complete");
        Ok(items)
    }
}
