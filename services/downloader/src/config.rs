//! Run configuration loaded from YAML and overridden from the command line.
//!
//! ```yaml
//! query:
//!   collections: C1373412034-LPDAAC_ECS
//!   start: 2021-10-17
//!   end: 2021-10-19
//! download:
//!   output_dir: data
//!   max_files: 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use granule_search::{
    parse_timestamp, CollectionSpec, Collections, GranuleQuery, LinkFilter, SearchResult,
    TemporalRange, DEFAULT_FILE_SUFFIX, DEFAULT_SEARCH_URL,
};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::auth::{default_netrc_path, EARTHDATA_LOGIN_HOST};
use crate::download::{DownloadConfig, CHUNK_SIZE};
use crate::error::PipelineError;

/// Root configuration for one fetch run.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub query: QuerySettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

/// Which granules to look for.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    /// One concept ID or a list
    pub collections: CollectionSpec,
    pub start: String,
    pub end: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    10
}

/// Search endpoint and link extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,
    /// Result pages fetched at once
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,
    #[serde(default = "default_search_timeout")]
    pub request_timeout_secs: u64,
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_file_suffix() -> String {
    DEFAULT_FILE_SUFFIX.to_string()
}

fn default_page_concurrency() -> usize {
    4
}

fn default_search_timeout() -> u64 {
    60
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            file_suffix: default_file_suffix(),
            page_concurrency: default_page_concurrency(),
            request_timeout_secs: default_search_timeout(),
        }
    }
}

/// Where and how assets are written.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Only the first N discovered links are fetched; `null` fetches all.
    #[serde(default = "default_max_files")]
    pub max_files: Option<usize>,
    #[serde(default = "default_download_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_auth_failure_limit")]
    pub auth_failure_limit: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_files() -> Option<usize> {
    Some(5)
}

fn default_download_timeout() -> u64 {
    600
}

fn default_auth_failure_limit() -> usize {
    3
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent: default_max_concurrent(),
            max_files: default_max_files(),
            request_timeout_secs: default_download_timeout(),
            auth_failure_limit: default_auth_failure_limit(),
        }
    }
}

/// Identity provider and credential source.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_auth_host")]
    pub host: String,
    /// Defaults to `~/.netrc`
    #[serde(default)]
    pub netrc_path: Option<PathBuf>,
}

fn default_auth_host() -> String {
    EARTHDATA_LOGIN_HOST.to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            host: default_auth_host(),
            netrc_path: None,
        }
    }
}

impl FetchConfig {
    /// Defaults everywhere except the query.
    pub fn new(query: QuerySettings) -> Self {
        Self {
            query,
            search: SearchSettings::default(),
            download: DownloadSettings::default(),
            auth: AuthSettings::default(),
        }
    }

    /// Load a run configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded fetch config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.query()?;
        self.search_url()?;

        if self.search.file_suffix.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "file_suffix must not be empty".to_string(),
            ));
        }
        if self.search.page_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "page_concurrency must be at least 1".to_string(),
            ));
        }
        if self.download.max_concurrent == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.download.max_files == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_files must be at least 1; leave it unset to fetch everything".to_string(),
            ));
        }
        if self.auth.host.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "auth host must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn query(&self) -> SearchResult<GranuleQuery> {
        let collections = Collections::try_from(self.query.collections.clone())?;
        let temporal = TemporalRange::new(
            parse_timestamp(&self.query.start)?,
            parse_timestamp(&self.query.end)?,
        )?;
        GranuleQuery::new(collections, temporal, self.query.page_size)
    }

    pub fn search_url(&self) -> Result<Url, PipelineError> {
        Url::parse(&self.search.url).map_err(|e| {
            PipelineError::InvalidConfig(format!("search url {:?}: {e}", self.search.url))
        })
    }

    pub fn link_filter(&self) -> LinkFilter {
        LinkFilter::new(self.search.file_suffix.clone())
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.request_timeout_secs)
    }

    /// Configured netrc path with `~` expanded, or `~/.netrc`.
    pub fn netrc_path(&self) -> PathBuf {
        match &self.auth.netrc_path {
            Some(path) => {
                PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
            }
            None => default_netrc_path(),
        }
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            output_dir: self.download.output_dir.clone(),
            max_concurrent: self.download.max_concurrent,
            chunk_size: CHUNK_SIZE,
            request_timeout: Duration::from_secs(self.download.request_timeout_secs),
            auth_failure_limit: self.download.auth_failure_limit,
        }
    }
}
