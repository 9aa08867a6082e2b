//! Granule search against the NASA CMR API.
//!
//! Turns a [`GranuleQuery`] into the list of result pages that enumerate every
//! match, then pulls the asset links out of those pages:
//!
//! - [`discover_pages`] issues the hit-count request and derives page URLs
//! - [`extract_links`] fetches pages concurrently and filters their links
//!
//! No credentials are needed; the search API is public.

pub mod error;
pub mod feed;
pub mod links;
pub mod paginate;
pub mod query;

pub use error::{SearchError, SearchResult};
pub use feed::{FeedLink, GranuleEntry, GranuleFeed};
pub use links::{extract_links, ExtractionReport, LinkFilter, PageFailure};
pub use paginate::{
    build_page_urls, discover_pages, page_count, structured_endpoint, PageDescriptor, HITS_HEADER,
};
pub use query::{
    parse_timestamp, CollectionSpec, Collections, GranuleQuery, TemporalRange,
    CMR_TIMESTAMP_FORMAT,
};

/// CMR granule search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules";

/// VIIRS surface reflectance granules are distributed as HDF5.
pub const DEFAULT_FILE_SUFFIX: &str = ".h5";
