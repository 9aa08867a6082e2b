//! Error types for granule search.

use thiserror::Error;

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors raised while discovering and reading search result pages.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The query itself is unusable (empty collections, reversed time range, zero page size).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The preliminary hit-count request returned a non-success status.
    #[error("granule discovery failed with HTTP status {status}")]
    DiscoveryFailed { status: u16 },

    /// The preliminary hit-count request failed before a response arrived.
    #[error("search request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// A result page could not be fetched at the transport level.
    #[error("request for page {page} failed: {source}")]
    ExtractionTransportFailed {
        page: u64,
        #[source]
        source: reqwest::Error,
    },

    /// A result page answered with a non-success status.
    #[error("page {page} returned HTTP status {status}")]
    PageStatus { page: u64, status: u16 },

    /// A response did not have the expected shape.
    #[error("malformed search response: {0}")]
    MalformedResponse(String),
}

impl SearchError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::DiscoveryFailed { status } | SearchError::PageStatus { status, .. } => {
                Some(*status)
            }
            SearchError::Transport(e) | SearchError::ExtractionTransportFailed { source: e, .. } => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }
}
