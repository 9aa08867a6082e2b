//! End-to-end run: credentials, discovery, extraction, bounded download.

use granule_search::{discover_pages, extract_links, ExtractionReport, GranuleQuery, PageDescriptor};
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::auth::resolve_credentials;
use crate::config::FetchConfig;
use crate::download::{DownloadManager, DownloadReport};
use crate::error::{FetchError, PipelineError};
use crate::session::AuthenticatedSession;

/// Pages and links found for the configured query.
#[derive(Debug)]
pub struct Discovery {
    pub pages: Vec<PageDescriptor>,
    pub extraction: ExtractionReport,
}

impl Discovery {
    pub fn links(&self) -> &[String] {
        &self.extraction.links
    }
}

/// Everything a run did, for the end-of-run report.
#[derive(Debug)]
pub struct RunSummary {
    pub pages: usize,
    pub discovered: usize,
    pub selected: usize,
    pub discovery: Discovery,
    pub downloads: DownloadReport,
}

impl RunSummary {
    /// A page or a file did not make it, including files skipped by cancellation.
    pub fn has_failures(&self) -> bool {
        !self.discovery.extraction.is_complete()
            || self.downloads.failed() > 0
            || self.downloads.cancelled() > 0
    }

    pub fn log(&self) {
        info!(
            pages = self.pages,
            pages_failed = self.discovery.extraction.failures.len(),
            discovered = self.discovered,
            selected = self.selected,
            completed = self.downloads.completed(),
            failed = self.downloads.failed(),
            cancelled = self.downloads.cancelled(),
            bytes = self.downloads.total_bytes(),
            "Run finished"
        );

        for failure in &self.discovery.extraction.failures {
            warn!(page = failure.page, url = %failure.url, error = %failure.error, "Page failed");
        }
        for outcome in self.downloads.failures() {
            if let Some(e) = outcome.error() {
                error!(url = %outcome.url, status = ?e.status(), error = %e, "File failed");
            }
        }
    }
}

/// First `max_files` links as URLs, in discovery order.
fn select_links(links: &[String], max_files: Option<usize>) -> Vec<Url> {
    links
        .iter()
        .take(max_files.unwrap_or(usize::MAX))
        .filter_map(|link| match Url::parse(link) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(link, error = %e, "Skipping unparsable link");
                None
            }
        })
        .collect()
}

/// Runs the configured query and fetches what it finds.
pub struct Pipeline {
    config: FetchConfig,
    search_client: Client,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: FetchConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let search_client = Client::builder()
            .timeout(config.search_timeout())
            .tcp_nodelay(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            config,
            search_client,
            cancel: CancellationToken::new(),
        })
    }

    /// Cancelling `token` stops downloads that have not started.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Discover pages and extract links without credentials or downloads.
    pub async fn discover(&self) -> Result<Discovery, PipelineError> {
        let query = self.config.query()?;
        self.discover_query(&query).await
    }

    async fn discover_query(&self, query: &GranuleQuery) -> Result<Discovery, PipelineError> {
        let base_url = self.config.search_url()?;
        let pages = discover_pages(&self.search_client, &base_url, query).await?;
        let extraction = extract_links(
            &self.search_client,
            &pages,
            &self.config.link_filter(),
            self.config.search.page_concurrency,
        )
        .await;

        Ok(Discovery { pages, extraction })
    }

    /// Full run.
    ///
    /// Credentials are resolved before the first request so a missing or
    /// incomplete netrc stops the run without touching the network. After
    /// discovery, individual page and file failures are reported in the
    /// summary rather than returned as errors.
    #[instrument(skip(self), fields(auth_host = %self.config.auth.host))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let query = self.config.query()?;

        let netrc_path = self.config.netrc_path();
        let credentials = resolve_credentials(&netrc_path, &self.config.auth.host).await?;
        let download_config = self.config.download_config();
        let session = AuthenticatedSession::new(
            credentials,
            self.config.auth.host.clone(),
            download_config.request_timeout,
        )?;

        let output_dir = download_config.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let discovery = self.discover_query(&query).await?;
        let discovered = discovery.links().len();
        let selected = select_links(discovery.links(), self.config.download.max_files);

        info!(
            discovered,
            selected = selected.len(),
            output_dir = %output_dir.display(),
            "Starting downloads"
        );

        let manager = DownloadManager::new(session, download_config)
            .with_cancellation(self.cancel.child_token());
        let downloads = manager.download_all(&selected).await;

        Ok(RunSummary {
            pages: discovery.pages.len(),
            discovered,
            selected: selected.len(),
            discovery,
            downloads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://host/{i}.h5")).collect()
    }

    #[test]
    fn test_select_takes_prefix() {
        let selected = select_links(&links(8), Some(5));
        assert_eq!(selected.len(), 5);
        assert_eq!(selected[0].path(), "/0.h5");
        assert_eq!(selected[4].path(), "/4.h5");
    }

    #[test]
    fn test_select_all_when_unbounded() {
        assert_eq!(select_links(&links(8), None).len(), 8);
        assert_eq!(select_links(&links(3), Some(5)).len(), 3);
    }
}
