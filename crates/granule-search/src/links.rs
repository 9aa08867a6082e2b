//! Asset link extraction across result pages.

use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use crate::error::{SearchError, SearchResult};
use crate::feed::GranuleFeed;
use crate::paginate::{PageDescriptor, JSON_MEDIA_TYPE};

/// Accepts `https` links whose text ends in a given file suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilter {
    suffix: String,
}

impl LinkFilter {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn matches(&self, href: &str) -> bool {
        if !href.ends_with(&self.suffix) {
            return false;
        }
        Url::parse(href)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }
}

/// A page that contributed no links because it failed.
#[derive(Debug)]
pub struct PageFailure {
    pub page: u64,
    pub url: Url,
    pub error: SearchError,
}

/// Links gathered from every page that succeeded, plus the pages that did not.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Page order, then entry order, then link order. Not deduplicated.
    pub links: Vec<String>,
    pub failures: Vec<PageFailure>,
    pub pages_fetched: usize,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn fetch_page_links(
    client: &Client,
    page: &PageDescriptor,
    filter: &LinkFilter,
) -> SearchResult<Vec<String>> {
    let transport = |source| SearchError::ExtractionTransportFailed {
        page: page.index,
        source,
    };

    let response = client
        .get(page.url.clone())
        .header(ACCEPT, JSON_MEDIA_TYPE)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::PageStatus {
            page: page.index,
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(transport)?;
    let feed = GranuleFeed::from_slice(&body)?;

    Ok(feed.asset_links(filter).map(str::to_string).collect())
}

/// Fetch every page (at most `max_concurrent` at a time) and collect matching asset links.
///
/// A failing page is recorded in [`ExtractionReport::failures`] and does not
/// prevent the other pages from contributing. Results are assembled in page
/// order regardless of completion order.
#[instrument(skip_all, fields(pages = pages.len(), suffix = %filter.suffix()))]
pub async fn extract_links(
    client: &Client,
    pages: &[PageDescriptor],
    filter: &LinkFilter,
    max_concurrent: usize,
) -> ExtractionReport {
    let results = stream::iter(pages)
        .map(|page| async move { (page, fetch_page_links(client, page, filter).await) })
        .buffered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut report = ExtractionReport::default();

    for (page, result) in results {
        match result {
            Ok(links) => {
                metrics::counter!("granule_pages_total", "status" => "ok").increment(1);
                debug!(page = page.index, links = links.len(), "Extracted page links");
                report.pages_fetched += 1;
                report.links.extend(links);
            }
            Err(error) => {
                metrics::counter!("granule_pages_total", "status" => "failed").increment(1);
                warn!(page = page.index, url = %page.url, error = %error, "Result page failed");
                report.failures.push(PageFailure {
                    page: page.index,
                    url: page.url.clone(),
                    error,
                });
            }
        }
    }

    info!(
        links = report.links.len(),
        pages_ok = report.pages_fetched,
        pages_failed = report.failures.len(),
        "Link extraction complete"
    );

    report
}
