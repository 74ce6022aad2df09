//! Connection settings.

use scrubsync_core::{StoreError, StoreResult};
use std::env;
use std::fmt;

/// Environment variable holding the connection string.
pub const DB_URI_VAR: &str = "DB_URI";

/// Environment variable overriding the database named in the connection string.
pub const DB_NAME_VAR: &str = "DB_NAME";

/// Collection holding the original records.
pub const SOURCE_COLLECTION: &str = "customers";

/// Collection receiving scrubbed records.
pub const SINK_COLLECTION: &str = "anonymized_customers";

/// Collection holding sync progress.
pub const CHECKPOINT_COLLECTION: &str = "syncState";

/// Where and how to connect.
#[derive(Clone)]
pub struct MongoConfig {
    /// Connection string.
    pub uri: String,
    /// Database name; `None` uses the database named in `uri`.
    pub db_name: Option<String>,
    /// Source collection name.
    pub source_collection: String,
    /// Sink collection name.
    pub sink_collection: String,
    /// Checkpoint collection name.
    pub checkpoint_collection: String,
}

impl MongoConfig {
    /// Creates a configuration for `uri` with the default collection names.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            db_name: None,
            source_collection: SOURCE_COLLECTION.to_owned(),
            sink_collection: SINK_COLLECTION.to_owned(),
            checkpoint_collection: CHECKPOINT_COLLECTION.to_owned(),
        }
    }

    /// Sets the database name.
    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Loads a `.env` file if present, then reads `DB_URI` (required) and
    /// `DB_NAME` (optional).
    pub fn from_env() -> StoreResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let uri = env::var(DB_URI_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                StoreError::Configuration(format!("{DB_URI_VAR} is not defined in the environment"))
            })?;

        let mut config = Self::new(uri);
        if let Some(name) = env::var(DB_NAME_VAR).ok().filter(|v| !v.is_empty()) {
            config = config.with_db_name(name);
        }
        Ok(config)
    }
}

// The connection string may carry credentials.
impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("uri", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("source_collection", &self.source_collection)
            .field("sink_collection", &self.sink_collection)
            .field("checkpoint_collection", &self.checkpoint_collection)
            .finish()
    }
}
