//! Keeps a local mirror of game assets up to date and turns the downloaded
//! bundles into plain files.

mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use sanity_cache::Fingerprints;
use sanity_config::{Config, DEFAULT_CONFIG_PATH};
use sanity_extract::ExternalReader;
use sanity_fetch::{DownloadOutcome, ReqwestClient, Remote, RetryPolicy};
use sanity_library::{ExtractContext, ExtractEvent, Processors, SyncContext, SyncEvent, SyncSummary};
use sanity_storage::BackendHandle;
use sanity_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "sanity=info,sanity_archive=info,sanity_cache=info,sanity_config=info,\
                              sanity_extract=info,sanity_fetch=info,sanity_library=info,sanity_process=info,\
                              sanity_storage=info";

/// Sync, extract and post-process game assets.
#[derive(Parser)]
#[command(name = "sanity", version, about)]
struct Cli {
    /// Configuration file; written with defaults when missing.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Work on what is already in the output directory.
    #[arg(long)]
    skip_sync: bool,
    #[arg(long)]
    skip_extract: bool,
    #[arg(long)]
    skip_process: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Run aborted");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Config::load_or_create(&cli.config).or_raise(|| ErrorKind::Config)?;
    let output_dir = std::path::absolute(&config.output_dir).or_raise(|| ErrorKind::Output)?;
    let backend: BackendHandle = Arc::new(LocalBackend::new("output", &output_dir).or_raise(|| ErrorKind::Output)?);
    let roots: Vec<PathBuf> = config.enabled_servers().map(|(server, _)| PathBuf::from(server.dir_name())).collect();
    tracing::info!(output = %output_dir.display(), servers = roots.len(), "Run started");

    if cli.skip_sync {
        tracing::info!("Sync skipped");
    } else {
        sync(&config, &backend).await?;
    }
    if cli.skip_extract {
        tracing::info!("Extraction skipped");
    } else {
        extract(&config, &backend, &roots).await;
    }
    if cli.skip_process {
        tracing::info!("Post-processing skipped");
    } else {
        let processors = Processors::discover(&config);
        sanity_library::process::process(&backend, &roots, &processors, &config).await;
    }
    tracing::info!("Run complete");
    Ok(())
}

async fn sync(config: &Config, backend: &BackendHandle) -> Result<()> {
    let client = ReqwestClient::new(&config.network).or_raise(|| ErrorKind::Client)?;
    let remote = Remote::new(client, RetryPolicy::from_config(&config.network));
    let fingerprints = Arc::new(Fingerprints::load(&config.cache_dir));
    let ctx = SyncContext::new(remote, fingerprints, Arc::clone(backend), config.concurrency.downloads);
    let servers = config.enabled_servers().map(|(server, cfg)| (server, cfg.clone())).collect();

    let mut total = SyncSummary::default();
    let mut failed_servers = 0usize;
    let mut events = std::pin::pin!(sanity_library::sync::sync(&ctx, servers));
    while let Some(event) = events.next().await {
        match event {
            Ok(SyncEvent::Downloaded { server, path, outcome }) => {
                if let DownloadOutcome::Failed(reason) = &outcome {
                    tracing::debug!(%server, %path, %reason, "Download failed");
                }
                total.record(&outcome);
            },
            Ok(SyncEvent::ServerFailed { .. }) => failed_servers += 1,
            Ok(_) => {},
            Err(e) => tracing::error!(error = ?e, "Sync error"),
        }
    }
    tracing::info!(summary = %total, failed_servers, "Sync complete");
    Ok(())
}

async fn extract(config: &Config, backend: &BackendHandle, roots: &[PathBuf]) {
    let Some(command) = config.extract.reader.as_deref() else {
        tracing::warn!("No bundle reader configured; extraction skipped");
        return;
    };
    let reader = match ExternalReader::discover(command) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!(error = ?e, "Extraction skipped");
            return;
        },
    };
    let ctx = ExtractContext::new(Arc::clone(backend), Arc::new(reader), &config.concurrency, config.extract.cleanup);

    let (mut bundles, mut kept, mut failed) = (0usize, 0usize, 0usize);
    let mut events = std::pin::pin!(sanity_library::extract::extract(&ctx, roots));
    while let Some(event) = events.next().await {
        match event {
            Ok(ExtractEvent::DiscoveryComplete(count)) => tracing::info!(bundles = count, "Bundles discovered"),
            Ok(ExtractEvent::Extracted(report)) => {
                bundles += 1;
                if !report.deleted {
                    kept += 1;
                }
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(error = ?e, "Bundle extraction failed");
                failed += 1;
            },
        }
    }
    tracing::info!(bundles, kept, failed, cleanup = ?ctx.cleanup(), "Extraction complete");
}
