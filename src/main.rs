//! CLI entry point for the download-manager tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use download_manager::download::default_user_agent;
use download_manager::{
    DownloadManager, HttpClient, HttpClientOptions, JobState, JobStore, JsonFileStore,
    LocalFileSystem,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{FileConfig, load_config, timeout_from_secs};
use cli::Args;

/// How often `--watch` re-reads the job file for external edits.
const RELOAD_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > default (info)
    let default_level = args
        .log_level()
        .or_else(|| loaded.config.verbosity.map(|v| v.log_level()))
        .unwrap_or("info");
    init_tracing(default_level);

    debug!(?args, "CLI arguments parsed");
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "loaded config file");
    }

    let jobs_path = resolve_jobs_path(&args, &loaded.config)?;
    let options = client_options(&args, &loaded.config);
    info!(jobs = %jobs_path.display(), watch = args.watch, "download-manager starting");

    let store = Arc::new(
        JsonFileStore::open(&jobs_path)
            .await
            .with_context(|| format!("Failed to load job list '{}'", jobs_path.display()))?,
    );
    let client = HttpClient::with_options(&options).context("Failed to build HTTP client")?;
    let manager = DownloadManager::start(store.clone(), Arc::new(client), Arc::new(LocalFileSystem));

    if args.watch {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
            () = follow_job_file(&store) => {}
        }
        info!("interrupted; stopping downloads");
    } else {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("interrupted; stopping downloads");
            }
            () = manager.wait_until_idle() => debug!("all jobs settled"),
        }
    }

    manager.unload().await;
    store
        .save()
        .await
        .with_context(|| format!("Failed to save job list '{}'", jobs_path.display()))?;
    log_summary(store.as_ref());

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn resolve_jobs_path(args: &Args, config: &FileConfig) -> Result<PathBuf> {
    match args.jobs.as_ref().or(config.jobs_file.as_ref()) {
        Some(path) => Ok(path.clone()),
        None => bail!("No job list given. Pass --jobs <FILE> or set `jobs_file` in the config file"),
    }
}

fn client_options(args: &Args, config: &FileConfig) -> HttpClientOptions {
    HttpClientOptions {
        user_agent: config
            .user_agent
            .clone()
            .unwrap_or_else(default_user_agent),
        connect_timeout: timeout_from_secs(args.connect_timeout.or(config.connect_timeout_secs)),
        read_timeout: timeout_from_secs(args.read_timeout.or(config.read_timeout_secs)),
    }
}

/// Re-reads the job file until cancelled, applying edits made by other programs.
async fn follow_job_file(store: &JsonFileStore) {
    let mut interval = tokio::time::interval(RELOAD_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match store.reload().await {
            Ok(true) => info!("job list changed; reconciling"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable job list"),
        }
    }
}

fn log_summary(store: &dyn JobStore) {
    let entries = store.read();
    let mut done = 0usize;
    let mut failed = 0usize;
    let mut pending = 0usize;
    for entry in &entries {
        match entry.job_state() {
            JobState::Done => done += 1,
            JobState::Error(message) => {
                failed += 1;
                warn!(url = %entry.url, error = %message, "download failed");
            }
            _ => pending += 1,
        }
    }
    info!(
        total = entries.len(),
        done,
        failed,
        pending,
        "download-manager finished"
    );
}
