//! Bulk granule downloader.
//!
//! Searches CMR for granules in a time window, extracts their asset links and
//! downloads them through an Earthdata Login session:
//! - Credentials come from a netrc file and are checked before any request
//! - Result pages are fetched concurrently, failed pages are reported
//! - Downloads are bounded, streamed to disk and isolated per file

pub mod auth;
pub mod config;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod session;

pub use auth::{default_netrc_path, resolve_credentials, Credentials, Netrc, EARTHDATA_LOGIN_HOST};
pub use config::FetchConfig;
pub use download::{
    assign_file_names, DownloadConfig, DownloadManager, DownloadReport, DownloadStatus,
    FileOutcome, CHUNK_SIZE,
};
pub use error::{FetchError, PipelineError};
pub use pipeline::{Discovery, Pipeline, RunSummary};
pub use session::{AuthenticatedSession, MAX_REDIRECTS};
