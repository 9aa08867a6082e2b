//! Typed view of the CMR JSON granule feed.
//!
//! Only the fields the pipeline consumes are modelled:
//! `feed.entry[].links[].href`. Anything else in the document is ignored.

use serde::Deserialize;

use crate::error::{SearchError, SearchResult};
use crate::links::LinkFilter;

#[derive(Debug, Clone, Deserialize)]
pub struct GranuleFeed {
    pub feed: Feed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    pub entry: Vec<GranuleEntry>,
}

/// One granule in the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct GranuleEntry {
    pub links: Vec<FeedLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedLink {
    pub href: String,
}

impl GranuleFeed {
    /// Parse a page body, failing with `MalformedResponse` when the feed shape is absent.
    pub fn from_slice(body: &[u8]) -> SearchResult<Self> {
        serde_json::from_slice(body).map_err(|e| SearchError::MalformedResponse(e.to_string()))
    }

    /// Links accepted by `filter`, in entry order then link order.
    pub fn asset_links<'a>(&'a self, filter: &'a LinkFilter) -> impl Iterator<Item = &'a str> + 'a {
        self.feed
            .entry
            .iter()
            .flat_map(|entry| entry.links.iter())
            .map(|link| link.href.as_str())
            .filter(move |href| filter.matches(href))
    }
}
