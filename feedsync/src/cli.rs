//! CLI glue for feedsync: command parsing, argument validation and the async
//! entrypoint. All reconciliation logic lives in `feedsync-core`; this module
//! only wires concrete collaborators (Admin API client, log notifier, file
//! tracking store) into the pipeline.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedsync_core::pipeline::SyncPipeline;

use crate::client::AdminClient;
use crate::load_config::load_config;
use crate::notifier::LogNotifier;
use crate::tracking::FileTrackingStore;

/// CLI for feedsync: reconcile supplier product feeds against a remote shop
/// catalog.
#[derive(Parser)]
#[clap(
    name = "feedsync",
    version,
    about = "Ingest a supplier XML feed and reconcile it against a shop catalog"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass using the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            config.sync.trace_loaded();
            tracing::info!(command = "sync", shop = %config.shop, "Starting reconciliation");

            let client = AdminClient::new_from_env()
                .map_err(|e| anyhow::anyhow!("Failed to construct catalog client from env: {e}"))?;
            let tracking = FileTrackingStore::open(&config.tracking_path)?;
            let pipeline = SyncPipeline::new(
                Arc::new(client),
                LogNotifier::default(),
                tracking,
                config.sync,
                config.shop,
            );

            match pipeline.run_from_url(&config.feed_url).await {
                Ok(report) => {
                    tracing::info!(command = "sync", run_id = %report.run_id, "Synchronisation complete");
                    println!(
                        "Sync report {}: {} groups, {} created, {} updated, {} skipped, {} errored, {} deleted",
                        report.run_id,
                        report.stats.total_groups,
                        report.stats.created,
                        report.stats.updated,
                        report.stats.skipped,
                        report.stats.errored,
                        report.stats.deleted,
                    );
                    for error in &report.stats.errors {
                        println!("  error: {} - {}", error.title, error.message);
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(anyhow::Error::msg(e.to_string()))
                }
            }
        }
    }
}
