//! Result-page discovery.
//!
//! One preliminary request reports the total hit count in the `CMR-Hits`
//! header. From that count we derive one URL per result page.

use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Url};
use std::num::NonZeroU32;
use tracing::{debug, info, instrument, warn};

use crate::error::{SearchError, SearchResult};
use crate::query::GranuleQuery;

/// Response header carrying the total number of matching granules (`CMR-Hits`).
pub const HITS_HEADER: &str = "cmr-hits";

/// Query parameter carrying the 1-based page index.
pub const PAGE_PARAM: &str = "page_num";

/// Media type requested from the search API.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// 1-based page index.
    pub index: u64,
    pub url: Url,
}

/// Number of pages needed to enumerate `hits` results.
pub fn page_count(hits: u64, page_size: NonZeroU32) -> u64 {
    hits.div_ceil(u64::from(page_size.get()))
}

/// Rewrite the endpoint so it answers with the structured JSON format.
///
/// The final path segment gains a `.json` extension (`granules` → `granules.json`);
/// a segment already ending in `.json` is left alone.
pub fn structured_endpoint(url: &Url) -> SearchResult<Url> {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| {
            SearchError::MalformedResponse(format!("search URL has no endpoint segment: {url}"))
        })?;

    if last.ends_with(".json") {
        return Ok(url.clone());
    }

    let structured = format!("{last}.json");
    let mut out = url.clone();
    out.path_segments_mut()
        .map_err(|_| SearchError::MalformedResponse(format!("search URL cannot be a base: {url}")))?
        .pop()
        .push(&structured);
    Ok(out)
}

/// Page URLs `1..=pages`, each carrying the page index as a query parameter.
pub fn build_page_urls(endpoint: &Url, pages: u64) -> Vec<PageDescriptor> {
    (1..=pages)
        .map(|index| {
            let mut url = endpoint.clone();
            url.query_pairs_mut()
                .append_pair(PAGE_PARAM, &index.to_string());
            PageDescriptor { index, url }
        })
        .collect()
}

fn read_hits(headers: &HeaderMap) -> SearchResult<u64> {
    let raw = headers
        .get(HITS_HEADER)
        .ok_or_else(|| SearchError::MalformedResponse("missing CMR-Hits header".to_string()))?;

    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            SearchError::MalformedResponse(format!("CMR-Hits header is not a count: {raw:?}"))
        })
}

/// Ask the search API how many granules match and return one descriptor per page.
///
/// Page URLs are derived from the resolved response URL, so redirects taken by
/// the count request carry over to every page.
#[instrument(skip(client, query), fields(base_url = %base_url))]
pub async fn discover_pages(
    client: &Client,
    base_url: &Url,
    query: &GranuleQuery,
) -> SearchResult<Vec<PageDescriptor>> {
    debug!(temporal = %query.temporal(), page_size = query.page_size().get(), "Requesting hit count");

    let response = client
        .get(base_url.clone())
        .query(&query.query_pairs())
        .header(ACCEPT, JSON_MEDIA_TYPE)
        .send()
        .await
        .map_err(SearchError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        warn!(
            collections = ?query.collections().as_slice(),
            status = status.as_u16(),
            "Granule discovery request failed"
        );
        return Err(SearchError::DiscoveryFailed {
            status: status.as_u16(),
        });
    }

    let hits = read_hits(response.headers())?;
    let pages = page_count(hits, query.page_size());
    let endpoint = structured_endpoint(response.url())?;

    info!(hits, pages, "Discovered result pages");

    Ok(build_page_urls(&endpoint, pages))
}
