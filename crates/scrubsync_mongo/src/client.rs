//! Connection handle.

use crate::checkpoints::MongoCheckpoints;
use crate::config::{MongoConfig, DB_NAME_VAR, DB_URI_VAR};
use crate::error::store_error;
use crate::records::MongoRecords;
use mongodb::bson::doc;
use mongodb::sync::{Client, Database};
use scrubsync_core::{StoreError, StoreResult};
use tracing::info;

/// The process-wide database connection.
///
/// Created once at startup and cloned into each component; clones share the
/// driver's connection pool.
#[derive(Clone)]
pub struct MongoHandle {
    database: Database,
    config: MongoConfig,
}

impl MongoHandle {
    /// Connects and verifies the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if no database is named, and
    /// [`StoreError::Connection`] if the server cannot be reached.
    pub fn connect(config: &MongoConfig) -> StoreResult<Self> {
        let client = Client::with_uri_str(&config.uri)
            .map_err(|e| store_error(e, StoreError::Connection))?;

        let database = match &config.db_name {
            Some(name) => client.database(name),
            None => client.default_database().ok_or_else(|| {
                StoreError::Configuration(format!(
                    "{DB_URI_VAR} names no database and {DB_NAME_VAR} is not set"
                ))
            })?,
        };

        database
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| store_error(e, StoreError::Connection))?;
        info!(database = database.name(), "connected to database");

        Ok(Self {
            database,
            config: config.clone(),
        })
    }

    /// Returns the database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns a customer collection by name.
    pub fn records(&self, name: &str) -> MongoRecords {
        MongoRecords::new(self.database.collection(name))
    }

    /// Returns the collection holding the original records.
    pub fn source(&self) -> MongoRecords {
        self.records(&self.config.source_collection)
    }

    /// Returns the collection receiving scrubbed records.
    pub fn sink(&self) -> MongoRecords {
        self.records(&self.config.sink_collection)
    }

    /// Returns the checkpoint slot.
    pub fn checkpoints(&self) -> MongoCheckpoints {
        MongoCheckpoints::new(self.database.collection(&self.config.checkpoint_collection))
    }
}
