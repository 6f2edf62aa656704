//! Paginated Catalog Source
//!
//! Pulls image names from a cursor-paginated listing API and hands them out
//! one at a time with a global, zero-based discovery index. Pages are only
//! fetched when the local buffer runs dry and another item is requested, so a
//! consumer that stops early never triggers further requests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use super::error::{BatchError, BatchResult};

/// Default listing endpoint for official Docker Hub images
pub const DEFAULT_CATALOG_URL: &str = "https://hub.docker.com/v2/repositories/library/";

/// Default number of entries requested per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One unit of work discovered in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub identifier: String,
}

/// One page of catalog results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<String>,
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(items: Vec<String>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            next_cursor: next_cursor.filter(|next| !next.is_empty()),
        }
    }

    /// A page with no successor
    pub fn last(items: Vec<String>) -> Self {
        Self::new(items, None)
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    results: Vec<CatalogEntry>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
}

/// Strictly decode a listing response body
pub fn decode_page(body: &str) -> BatchResult<Page> {
    let response: PageResponse = serde_json::from_str(body)
        .map_err(|e| BatchError::catalog(format!("Malformed catalog page: {e}")))?;

    let items = response.results.into_iter().map(|entry| entry.name).collect();
    Ok(Page::new(items, response.next))
}

/// Build the first-page URL for a listing endpoint
///
/// A `page_size` already present in the URL is left as given.
pub fn first_page_url(base_url: &str, page_size: usize) -> String {
    let has_page_size = reqwest::Url::parse(base_url)
        .map(|url| url.query_pairs().any(|(key, _)| key == "page_size"))
        .unwrap_or(false);
    if has_page_size {
        return base_url.to_string();
    }

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}page_size={page_size}")
}

/// Remote source of catalog pages
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Cursor of the first page
    fn first_cursor(&self) -> String;

    /// Fetch the page at `cursor`
    async fn fetch_page(&self, cursor: &str) -> BatchResult<Page>;
}

/// Catalog source backed by an HTTP listing API
pub struct HttpCatalog {
    client: reqwest::Client,
    first_url: String,
}

impl HttpCatalog {
    pub fn new(first_url: impl Into<String>) -> BatchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BatchError::catalog(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            first_url: first_url.into(),
        })
    }

    pub fn with_page_size(base_url: &str, page_size: usize) -> BatchResult<Self> {
        Self::new(first_page_url(base_url, page_size))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    fn first_cursor(&self) -> String {
        self.first_url.clone()
    }

    async fn fetch_page(&self, cursor: &str) -> BatchResult<Page> {
        debug!("Fetching catalog page: {}", cursor);

        let response = self.client.get(cursor).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BatchError::catalog_page(cursor, format!("HTTP {status}")));
        }

        let body = response.text().await?;
        decode_page(&body).map_err(|e| BatchError::catalog_page(cursor, e))
    }
}

/// Pull-based cursor over a catalog source
///
/// Not restartable: create a new cursor to list the catalog again. After a
/// fetch error the cursor is exhausted.
pub struct CatalogCursor {
    source: Arc<dyn CatalogSource>,
    cursor: Option<String>,
    buffer: VecDeque<String>,
    next_index: usize,
    pages_fetched: usize,
}

impl CatalogCursor {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        let cursor = Some(source.first_cursor());
        Self {
            source,
            cursor,
            buffer: VecDeque::new(),
            next_index: 0,
            pages_fetched: 0,
        }
    }

    /// Next item in discovery order, or `None` once the catalog is exhausted
    pub async fn next(&mut self) -> BatchResult<Option<WorkItem>> {
        loop {
            if let Some(identifier) = self.buffer.pop_front() {
                let item = WorkItem {
                    index: self.next_index,
                    identifier,
                };
                self.next_index += 1;
                return Ok(Some(item));
            }

            let Some(url) = self.cursor.take() else {
                return Ok(None);
            };

            let page = self.source.fetch_page(&url).await?;
            self.pages_fetched += 1;

            let mut items = page.items;
            items.sort();
            debug!(
                "Catalog page {} returned {} items (next: {})",
                self.pages_fetched,
                items.len(),
                page.next_cursor.as_deref().unwrap_or("none")
            );

            self.buffer.extend(items);
            self.cursor = page.next_cursor.filter(|next| !next.is_empty());
        }
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Number of items handed out so far
    pub fn items_emitted(&self) -> usize {
        self.next_index
    }
}
