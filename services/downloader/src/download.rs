//! Bounded concurrent downloads of granule assets.
//!
//! Key behaviours:
//! - At most `max_concurrent` transfers in flight
//! - Bodies streamed to disk in fixed-size chunks, never held in memory
//! - Each file succeeds or fails on its own; one failure never aborts the batch
//! - Existing files are overwritten, so re-running is idempotent
//! - Repeated credential rejections cancel whatever has not started yet

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Response, Url};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

use crate::error::FetchError;
use crate::session::AuthenticatedSession;

/// Bytes written per chunk.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory receiving downloaded files
    pub output_dir: PathBuf,
    /// Maximum simultaneous transfers
    pub max_concurrent: usize,
    /// Chunk size for streaming writes
    pub chunk_size: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// 401/403 responses tolerated before remaining downloads are cancelled
    pub auth_failure_limit: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            max_concurrent: 4,
            chunk_size: CHUNK_SIZE,
            request_timeout: Duration::from_secs(600), // 10 minutes
            auth_failure_limit: 3,
        }
    }
}

#[derive(Debug)]
pub enum DownloadStatus {
    Completed { path: PathBuf, bytes: u64 },
    Failed(FetchError),
    /// Never started because the batch was cancelled.
    Cancelled,
}

/// What happened to one asset.
#[derive(Debug)]
pub struct FileOutcome {
    pub url: String,
    pub file_name: Option<String>,
    pub status: DownloadStatus,
}

impl FileOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, DownloadStatus::Completed { .. })
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.status {
            DownloadStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcomes in input order, plus the highest number of transfers seen at once.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub outcomes: Vec<FileOutcome>,
    pub peak_in_flight: usize,
}

impl DownloadReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.error().is_some())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Cancelled))
            .count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                DownloadStatus::Completed { bytes, .. } => bytes,
                _ => 0,
            })
            .sum()
    }
}

/// Counts transfers in flight and remembers the peak.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Last path segment of `url`, if it names a file.
pub fn file_name_for(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn with_suffix(name: &str, n: usize) -> String {
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{stem}-{n}.{ext}"),
        _ => format!("{name}-{n}"),
    }
}

/// Local file names for a batch, one per URL.
///
/// Names come from the last path segment. When two URLs share a segment the
/// later ones get `-1`, `-2`, ... inserted before the extension so no transfer
/// overwrites another from the same batch.
pub fn assign_file_names(urls: &[Url]) -> Vec<Option<String>> {
    let mut taken = HashSet::new();

    urls.iter()
        .map(|url| {
            let name = file_name_for(url)?;
            let mut candidate = name.clone();
            let mut n = 0;
            while taken.contains(&candidate) {
                n += 1;
                candidate = with_suffix(&name, n);
            }
            taken.insert(candidate.clone());
            Some(candidate)
        })
        .collect()
}

/// Read until `buf` is full or the body ends.
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Stream a response body to `path`, truncating anything already there.
async fn stream_to_file(
    response: Response,
    path: &Path,
    chunk_size: usize,
) -> Result<u64, FetchError> {
    let url = response.url().to_string();
    let write_failed = |source| FetchError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(write_failed)?;

    let body = response
        .bytes_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    let reader = StreamReader::new(body);
    tokio::pin!(reader);

    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut written = 0u64;
    let mut chunks = 0usize;

    loop {
        let filled = fill_chunk(&mut reader, &mut chunk)
            .await
            .map_err(|source| FetchError::BodyRead {
                url: url.clone(),
                source,
            })?;
        if filled == 0 {
            break;
        }

        file.write_all(&chunk[..filled])
            .await
            .map_err(write_failed)?;
        written += filled as u64;
        chunks += 1;
        trace!(chunks, bytes = written, "Wrote chunk");
    }

    file.flush().await.map_err(write_failed)?;
    Ok(written)
}

/// Downloads a batch of asset URLs through one authenticated session.
pub struct DownloadManager {
    session: AuthenticatedSession,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl DownloadManager {
    pub fn new(session: AuthenticatedSession, config: DownloadConfig) -> Self {
        Self {
            session,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new transfers once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download every URL into the output directory.
    ///
    /// Outcomes are reported in input order. Files are written directly under
    /// `output_dir`, which must already exist.
    #[instrument(skip_all, fields(files = urls.len(), max_concurrent = self.config.max_concurrent))]
    pub async fn download_all(&self, urls: &[Url]) -> DownloadReport {
        let names = assign_file_names(urls);
        let in_flight = InFlight::default();
        let auth_rejections = AtomicUsize::new(0);
        let (in_flight_ref, rejections_ref) = (&in_flight, &auth_rejections);

        let mut indexed: Vec<(usize, FileOutcome)> =
            stream::iter(urls.iter().zip(names).enumerate())
                .map(|(index, (url, name))| async move {
                    let outcome = self.fetch_one(url, name, in_flight_ref, rejections_ref).await;
                    (index, outcome)
                })
                .buffer_unordered(self.config.max_concurrent.max(1))
                .collect()
                .await;
        indexed.sort_by_key(|(index, _)| *index);

        let report = DownloadReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
            peak_in_flight: in_flight.peak(),
        };

        info!(
            completed = report.completed(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            bytes = report.total_bytes(),
            peak_in_flight = report.peak_in_flight,
            "Download batch complete"
        );

        report
    }

    async fn fetch_one(
        &self,
        url: &Url,
        file_name: Option<String>,
        in_flight: &InFlight,
        auth_rejections: &AtomicUsize,
    ) -> FileOutcome {
        if self.cancel.is_cancelled() {
            metrics::counter!("granule_downloads_total", "status" => "cancelled").increment(1);
            return FileOutcome {
                url: url.to_string(),
                file_name,
                status: DownloadStatus::Cancelled,
            };
        }

        let Some(name) = file_name else {
            metrics::counter!("granule_downloads_total", "status" => "failed").increment(1);
            warn!(url = %url, "Asset URL has no file name");
            return FileOutcome {
                url: url.to_string(),
                file_name: None,
                status: DownloadStatus::Failed(FetchError::InvalidAssetUrl(url.to_string())),
            };
        };

        let _guard = in_flight.enter();
        let path = self.config.output_dir.join(&name);

        let status = match self.download(url, &path).await {
            Ok(bytes) => {
                metrics::counter!("granule_downloads_total", "status" => "ok").increment(1);
                info!(url = %url, path = %path.display(), bytes, "Download completed");
                DownloadStatus::Completed { path, bytes }
            }
            Err(e) => {
                metrics::counter!("granule_downloads_total", "status" => "failed").increment(1);
                error!(url = %url, error = %e, "Download failed");
                if e.is_auth_rejection() {
                    self.record_auth_rejection(auth_rejections);
                }
                DownloadStatus::Failed(e)
            }
        };

        FileOutcome {
            url: url.to_string(),
            file_name: Some(name),
            status,
        }
    }

    fn record_auth_rejection(&self, auth_rejections: &AtomicUsize) {
        let seen = auth_rejections.fetch_add(1, Ordering::SeqCst) + 1;
        let limit = self.config.auth_failure_limit;
        if limit > 0 && seen >= limit && !self.cancel.is_cancelled() {
            warn!(
                rejections = seen,
                username = self.session.username(),
                "Credentials repeatedly rejected, cancelling remaining downloads"
            );
            self.cancel.cancel();
        }
    }

    async fn download(&self, url: &Url, path: &Path) -> Result<u64, FetchError> {
        let response = self.session.get(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match stream_to_file(response, path, self.config.chunk_size).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                // Leave no truncated file behind
                fs::remove_file(path).await.ok();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(raw: &[&str]) -> Vec<Url> {
        raw.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    #[test]
    fn test_file_name_is_last_segment() {
        let url = Url::parse("https://e4ftl01.cr.usgs.gov/VIIRS/VNP09GA.001/a.h5?x=1").unwrap();
        assert_eq!(file_name_for(&url).as_deref(), Some("a.h5"));
        assert_eq!(file_name_for(&Url::parse("https://host/dir/").unwrap()), None);
        assert_eq!(file_name_for(&Url::parse("https://host").unwrap()), None);
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let names = assign_file_names(&urls(&[
            "https://a/x/granule.h5",
            "https://b/y/granule.h5",
            "https://c/other.h5",
            "https://d/z/granule.h5",
            "https://e/",
        ]));
        assert_eq!(
            names,
            vec![
                Some("granule.h5".to_string()),
                Some("granule-1.h5".to_string()),
                Some("other.h5".to_string()),
                Some("granule-2.h5".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_suffix_does_not_reuse_existing_name() {
        let names = assign_file_names(&urls(&[
            "https://a/g-1.h5",
            "https://a/g.h5",
            "https://b/g.h5",
        ]));
        assert_eq!(names[2].as_deref(), Some("g-2.h5"));
    }

    #[test]
    fn test_suffix_without_extension() {
        assert_eq!(with_suffix("README", 3), "README-3");
        assert_eq!(with_suffix("a.tar.gz", 1), "a.tar-1.gz");
    }

    #[test]
    fn test_in_flight_tracks_peak() {
        let gauge = InFlight::default();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
        }
        let _c = gauge.enter();
        assert_eq!(gauge.peak(), 2);
        assert_eq!(gauge.current.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fill_chunk_spans_short_reads() {
        let parts: Vec<io::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"abc")),
            Ok(bytes::Bytes::from_static(b"defg")),
            Ok(bytes::Bytes::from_static(b"h")),
        ];
        let mut reader = StreamReader::new(stream::iter(parts));
        let mut buf = [0u8; 5];

        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"fgh");
        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 0);
    }
}
