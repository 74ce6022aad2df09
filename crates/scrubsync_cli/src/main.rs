//! scrubsync
//!
//! Keeps the `anonymized_customers` collection in step with `customers`.
//!
//! Without flags, resumes from the stored checkpoint (or performs a full sync
//! when there is none) and then tails the change stream. With
//! `--full-reindex`, re-copies the whole source and exits.
//!
//! Connection settings come from `DB_URI` and `DB_NAME`, optionally through a
//! `.env` file.

mod logging;

use clap::Parser;
use scrubsync_engine::{SyncConfig, SyncOrchestrator, SyncOutcome};
use scrubsync_mongo::{MongoConfig, MongoHandle};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Maintains an anonymized mirror of the customers collection.
#[derive(Parser)]
#[command(name = "scrubsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Re-copy every record, then exit without tailing changes
    #[arg(long)]
    full_reindex: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "scrubsync stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = MongoConfig::from_env()?;
    let handle = MongoHandle::connect(&config)?;

    let orchestrator = SyncOrchestrator::new(
        SyncConfig::default(),
        Arc::new(handle.source()),
        Arc::new(handle.sink()),
        Arc::new(handle.checkpoints()),
    );

    match orchestrator.run(cli.full_reindex)? {
        SyncOutcome::Reindexed(report) => {
            info!(
                scanned = report.scanned,
                inserted = report.written.inserted,
                "full reindex finished"
            );
        }
        SyncOutcome::FeedEnded => {
            let stats = orchestrator.stats();
            info!(
                applied = stats.events_applied,
                reconnects = stats.reconnects,
                "change stream ended"
            );
        }
    }
    Ok(())
}
