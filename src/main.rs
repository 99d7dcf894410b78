//! protect-archiver-rs: archive UniFi Protect footage to local storage.
//!
//! Each `sync` run resumes from a JSON statefile in the destination
//! directory, downloads the footage recorded since the last run bucket by
//! bucket, and records progress after every bucket so an interrupted run
//! loses at most one bucket of work per camera.

#![warn(clippy::all)]

mod cli;
mod config;
mod footage;
mod interval;
mod protect;
mod retry;
mod state;
mod sync;
mod types;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Command, StatusArgs, SyncArgs};
use footage::ProtectFetcher;
use protect::ProtectClient;
use state::{JsonStateStore, StateStore};
use sync::SyncOrchestrator;

/// Print the high-water mark of every camera recorded in the statefile.
async fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    let destination = config::expand_tilde(&args.dest);
    let store = JsonStateStore::in_destination(&destination, &config::expand_tilde(&args.statefile));

    if !store.path().exists() {
        println!("No statefile found at {}", store.path().display());
        println!("Run a sync first to create it.");
        return Ok(());
    }

    let state = store.load().await?;
    println!("Statefile: {}", store.path().display());
    println!();
    if state.is_empty() {
        println!("No cameras synchronized yet.");
        return Ok(());
    }
    println!("Cameras:");
    for (id, camera) in &state.cameras {
        println!(
            "  {:<28} {:<24} synchronized through {}",
            id,
            camera.name,
            camera.last.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn prompt_password(username: &str) -> anyhow::Result<String> {
    let prompt = format!("Protect password for {}: ", username);
    let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt)).await??;
    Ok(password)
}

async fn run_sync(args: SyncArgs) -> anyhow::Result<()> {
    let config = config::Config::from_cli(args)?;
    tracing::debug!(?config, "Parsed configuration");

    let destination = sync::validate_destination(&config.destination)?;

    let password = match config.password.clone() {
        Some(password) => password,
        None => prompt_password(&config.username).await?,
    };

    let client = Arc::new(ProtectClient::connect(config.client_config(password)).await?);
    tracing::info!("Connected to {}", client.base_url());

    let (cameras, unknown) = config.cameras.apply(client.cameras().await?);
    for id in &unknown {
        tracing::warn!(camera = %id, "Requested camera not found on the server");
    }
    tracing::info!(
        "Synchronizing {} camera(s): {}",
        cameras.len(),
        cameras
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let store = JsonStateStore::in_destination(&destination, &config.statefile);
    tracing::debug!(statefile = %store.path().display(), "Using statefile");

    let fetcher = Arc::new(ProtectFetcher::new(
        Arc::clone(&client),
        config.fetch_config(&destination),
    ));
    let orchestrator = SyncOrchestrator::new(config.sync_config(), store, Arc::clone(&fetcher));
    let report = match orchestrator.run(&cameras).await {
        Ok(report) => report,
        Err(sync::SyncError::State(e)) if e.is_corrupt() => {
            anyhow::bail!(
                "{}\nAlternatively pass --ignore-state to start over.",
                e
            );
        }
        Err(e) => return Err(e.into()),
    };

    let totals = fetcher.totals();
    tracing::info!(
        range = %report.range,
        buckets_fetched = report.fetched,
        buckets_skipped = report.skipped,
        buckets_failed = report.failures.len(),
        "Sync finished"
    );
    tracing::info!(
        files_downloaded = totals.downloaded,
        files_skipped = totals.skipped,
        files_failed = totals.failed,
        empty_segments = totals.empty,
        bytes = totals.bytes,
        "Download statistics"
    );
    if !report.is_complete() {
        tracing::warn!(
            "{} bucket(s) failed and will be retried on the next run:",
            report.failures.len()
        );
        for failure in &report.failures {
            tracing::warn!("  {}", failure);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.command {
        Command::Status(args) => run_status(args).await,
        Command::Sync(args) => run_sync(args).await,
    }
}
