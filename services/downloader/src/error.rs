//! Error types for authenticated downloads and the end-to-end run.

use std::io;
use std::path::PathBuf;

use granule_search::SearchError;
use thiserror::Error;

/// Failures fetching a single asset, or preparing to fetch any.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not authenticated for {host}: {reason}")]
    NotAuthenticated { host: String, reason: String },

    #[error("download of {url} failed with HTTP status {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("request for {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading body of {url} failed: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("writing {path} failed: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("more than {limit} redirects fetching {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("asset URL has no file name: {0}")]
    InvalidAssetUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status behind the failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DownloadFailed { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The server rejected our credentials.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Errors that stop a run before any per-file work is reported.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection_statuses() {
        let rejected = |status| FetchError::DownloadFailed {
            url: "https://host/a.h5".to_string(),
            status,
        };
        assert!(rejected(401).is_auth_rejection());
        assert!(rejected(403).is_auth_rejection());
        assert!(!rejected(404).is_auth_rejection());
        assert!(!FetchError::InvalidAssetUrl("x".into()).is_auth_rejection());
    }

    #[test]
    fn test_search_errors_convert() {
        let err: PipelineError = SearchError::DiscoveryFailed { status: 500 }.into();
        assert!(matches!(
            err,
            PipelineError::Search(SearchError::DiscoveryFailed { status: 500 })
        ));
    }
}
