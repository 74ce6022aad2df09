//! scrubsync-generate
//!
//! Inserts batches of random customers into the source collection until
//! stopped, for demos and load tests.

mod logging;

use clap::Parser;
use scrubsync_core::{RecordGenerator, RecordSink};
use scrubsync_mongo::{MongoConfig, MongoHandle};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// Pause between successful batches.
const BATCH_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after a failed batch.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Feeds random customers into the source collection.
#[derive(Parser)]
#[command(name = "scrubsync-generate")]
#[command(author, version, about, long_about = None)]
struct Cli {}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    logging::init();

    let handle = match MongoConfig::from_env().and_then(|config| MongoHandle::connect(&config)) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to start generator");
            return ExitCode::FAILURE;
        }
    };

    let customers = handle.source();
    let mut generator = RecordGenerator::new();
    loop {
        let size = generator.batch_size();
        let batch = generator.batch(size);
        match customers.insert_many(&batch) {
            Ok(inserted) => {
                info!(inserted, "added customers");
                thread::sleep(BATCH_INTERVAL);
            }
            Err(e) => {
                error!(error = %e, "failed to add customers");
                thread::sleep(RETRY_DELAY);
            }
        }
    }
}
