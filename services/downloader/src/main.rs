//! Bulk granule downloader.
//!
//! Finds granules of one or more CMR collections inside a time window and
//! downloads their HDF5 assets with Earthdata Login credentials from netrc.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use granule_downloader::config::QuerySettings;
use granule_downloader::{FetchConfig, Pipeline};
use granule_search::CollectionSpec;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "granule-downloader")]
#[command(about = "Search CMR for granules and download their assets")]
struct Args {
    /// YAML run configuration; flags below override it
    #[arg(long, env = "GRANULE_CONFIG")]
    config: Option<PathBuf>,

    /// Collection concept ID (repeatable)
    #[arg(short, long = "collection")]
    collections: Vec<String>,

    /// Start of the time window (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// End of the time window (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Results per search page
    #[arg(long)]
    page_size: Option<u32>,

    /// Only links ending in this suffix are downloaded
    #[arg(long)]
    suffix: Option<String>,

    /// Download at most this many files
    #[arg(long, conflicts_with = "all")]
    max_files: Option<usize>,

    /// Download every discovered file
    #[arg(long)]
    all: bool,

    /// Maximum concurrent downloads
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Directory for downloaded files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// netrc file holding Earthdata Login credentials
    #[arg(long, env = "NETRC")]
    netrc: Option<PathBuf>,

    /// Identity provider host looked up in netrc
    #[arg(long)]
    auth_host: Option<String>,

    /// CMR granule search endpoint
    #[arg(long, env = "CMR_SEARCH_URL")]
    search_url: Option<String>,

    /// List matching links without downloading
    #[arg(long)]
    dry_run: bool,

    /// Write counters in Prometheus text format here when the run ends
    #[arg(long, env = "GRANULE_METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_config(args: &Args) -> Result<FetchConfig> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::load(path)?,
        None => {
            if args.collections.is_empty() {
                bail!("--collection is required without --config");
            }
            FetchConfig::new(QuerySettings {
                collections: CollectionSpec::Many(args.collections.clone()),
                start: args.start.clone().context("--start is required without --config")?,
                end: args.end.clone().context("--end is required without --config")?,
                page_size: 10,
            })
        }
    };

    if !args.collections.is_empty() {
        config.query.collections = CollectionSpec::Many(args.collections.clone());
    }
    if let Some(start) = &args.start {
        config.query.start = start.clone();
    }
    if let Some(end) = &args.end {
        config.query.end = end.clone();
    }
    if let Some(page_size) = args.page_size {
        config.query.page_size = page_size;
    }
    if let Some(suffix) = &args.suffix {
        config.search.file_suffix = suffix.clone();
    }
    if let Some(url) = &args.search_url {
        config.search.url = url.clone();
    }
    if args.all {
        config.download.max_files = None;
    } else if let Some(max_files) = args.max_files {
        config.download.max_files = Some(max_files);
    }
    if let Some(max_concurrent) = args.max_concurrent {
        config.download.max_concurrent = max_concurrent;
    }
    if let Some(output_dir) = &args.output_dir {
        config.download.output_dir = output_dir.clone();
    }
    if let Some(netrc) = &args.netrc {
        config.auth.netrc_path = Some(netrc.clone());
    }
    if let Some(host) = &args.auth_host {
        config.auth.host = host.clone();
    }

    Ok(config)
}

async fn write_metrics(handle: &PrometheusHandle, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    tokio::fs::write(path, handle.render())
        .await
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "Wrote metrics");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let config = build_config(&args)?;
    let pipeline = Pipeline::new(config).context("Invalid run configuration")?;

    if args.dry_run {
        let discovery = pipeline.discover().await?;
        info!(
            pages = discovery.pages.len(),
            pages_failed = discovery.extraction.failures.len(),
            links = discovery.links().len(),
            "Dry run complete"
        );
        for link in discovery.links() {
            println!("{link}");
        }
        return write_metrics(&prometheus_handle, args.metrics_file.as_deref()).await;
    }

    // Ctrl+C stops new downloads; running ones finish
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.cancel();
    });

    info!("Starting granule download");
    let summary = pipeline.with_cancellation(cancel).run().await?;
    summary.log();
    write_metrics(&prometheus_handle, args.metrics_file.as_deref()).await?;

    if summary.has_failures() {
        bail!(
            "{} of {} downloads failed, {} cancelled, {} result pages failed",
            summary.downloads.failed(),
            summary.selected,
            summary.downloads.cancelled(),
            summary.discovery.extraction.failures.len()
        );
    }

    Ok(())
}
