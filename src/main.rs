//! # ClockRelay — time-tracker to chat bridge
//!
//! Syncs tasks and time entries from the upstream tracker, computes
//! estimate-vs-actual usage, and delivers block-formatted reports through
//! slash commands with asynchronous callback delivery.
//!
//! Usage:
//!   clockrelay                    # Start the gateway server
//!   clockrelay sync               # One-shot full sync and exit
//!   clockrelay report weekly      # Print a plain-text report to stdout

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use clockrelay_core::config::RelayConfig;
use clockrelay_gateway::command::{period_range, Topic};
use clockrelay_gateway::{report_for_topic, AppState};
use clockrelay_store::sync::{full_sync, sync_time_entries};
use clockrelay_store::RelayStore;
use clockrelay_upstream::{RetryPolicy, TrackerClient};

#[derive(Parser)]
#[command(
    name = "clockrelay",
    version,
    about = "⏱️ ClockRelay — estimate-vs-actual reports from your time tracker"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default)
    Serve,
    /// Run a one-shot full sync against the upstream tracker
    Sync,
    /// Print a plain-text report to stdout
    Report {
        /// Report topic: daily, weekly or monthly
        #[arg(default_value = "daily")]
        topic: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = RelayConfig::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => clockrelay_gateway::start(config).await,
        Commands::Sync => run_sync(config).await,
        Commands::Report { topic } => run_report(config, &topic).await,
    }
}

async fn run_sync(config: RelayConfig) -> Result<()> {
    let store = RelayStore::open(std::path::Path::new(&config.db_path))?;
    let tracker = TrackerClient::new(&config.tracker, RetryPolicy::from_config(&config.retry));

    let tasks = tracker.fetch_tasks().await?;
    let outcome = full_sync(&store, &tasks)?;

    let today = chrono::Utc::now().date_naive();
    let range = period_range(Topic::FullSync, today);
    let entries = tracker.fetch_time_entries(range.prev_from, range.to).await?;
    let synced = sync_time_entries(&store, &entries)?;
    store.cleanup_orphaned_entries()?;

    println!(
        "Sync complete: {} created, {} updated, {} entries",
        outcome.created, outcome.updated, synced
    );
    Ok(())
}

/// One-shot report through the same pipeline the dispatcher uses, so the
/// CLI and the slash-command path cannot drift.
async fn run_report(config: RelayConfig, topic: &str) -> Result<()> {
    let topic = Topic::parse(topic);
    let store = Arc::new(RelayStore::open(std::path::Path::new(&config.db_path))?);
    let tracker = TrackerClient::new(&config.tracker, RetryPolicy::from_config(&config.retry));
    let state = AppState::new(config, store, tracker);

    let message = report_for_topic(&state, topic).await?;
    println!("{}", message.text);
    Ok(())
}
