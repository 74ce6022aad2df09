//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Server error code reported for a duplicate `_id` on insert.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// A single record that a bulk insert could not write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// Server error code.
    pub code: i32,
    /// Server error message.
    pub message: String,
}

impl WriteFailure {
    /// Creates a write failure.
    pub fn new(index: usize, code: i32, message: impl Into<String>) -> Self {
        Self {
            index,
            code,
            message: message.into(),
        }
    }

    /// Creates a duplicate-key failure for the record at `index`.
    pub fn duplicate(index: usize) -> Self {
        Self::new(index, DUPLICATE_KEY_CODE, "E11000 duplicate key error")
    }

    /// Returns true if the record was rejected because its identity already exists.
    pub fn is_duplicate_key(&self) -> bool {
        self.code == DUPLICATE_KEY_CODE
    }
}

/// Errors that can occur while talking to a collection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection dropped, timed out or was never established.
    #[error("connection error: {0}")]
    Connection(String),

    /// An unordered bulk insert wrote some records and rejected others.
    #[error("bulk write rejected {} record(s), {inserted} inserted", failures.len())]
    BulkWrite {
        /// Number of records that were written.
        inserted: u64,
        /// Per-record failures.
        failures: Vec<WriteFailure>,
    },

    /// A query was rejected by the server.
    #[error("query error: {0}")]
    Query(String),

    /// The change feed reported an error.
    #[error("change feed error: {0}")]
    Feed(String),

    /// A stored document could not be converted.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Required connection settings are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Returns true if the failure is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Feed(_))
    }
}
