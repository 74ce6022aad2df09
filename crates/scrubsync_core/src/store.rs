//! Storage traits the sync engine runs against.

use crate::change::{ChangeEvent, FeedFilter};
use crate::error::StoreResult;
use crate::record::{Record, Timestamp};

/// A cursor over records, yielded one at a time.
pub type RecordCursor = Box<dyn Iterator<Item = StoreResult<Record>>>;

/// A live, ordered stream of change events.
///
/// Blocks while waiting for the next event. Ends (`None`) when the feed is
/// closed by the server.
pub type ChangeStream = Box<dyn Iterator<Item = StoreResult<ChangeEvent>>>;

/// The collection being mirrored. Read-only to the sync engine.
///
/// # Implementors
///
/// - [`crate::MemoryCollection`] - For testing
/// - `scrubsync_mongo::MongoRecords` - For MongoDB deployments
pub trait RecordSource: Send + Sync {
    /// Streams every record in storage order.
    fn find_all(&self) -> StoreResult<RecordCursor>;

    /// Streams records created at or after `since`, oldest first.
    fn find_since(&self, since: Timestamp) -> StoreResult<RecordCursor>;

    /// Opens a live change feed filtered server-side by `filter`.
    ///
    /// Only changes committed after the subscription is opened are delivered.
    fn watch(&self, filter: &FeedFilter) -> StoreResult<ChangeStream>;
}

/// The collection receiving scrubbed records. Write-only to the sync engine.
pub trait RecordSink: Send + Sync {
    /// Inserts records without stopping at the first failure.
    ///
    /// Returns the number inserted. If any record was rejected, returns
    /// [`crate::StoreError::BulkWrite`] describing each rejection; records
    /// not listed there were written.
    ///
    /// # Errors
    ///
    /// Any other error means the batch as a whole failed.
    fn insert_many(&self, records: &[Record]) -> StoreResult<u64>;
}

/// A durable key/timestamp slot holding sync progress.
pub trait CheckpointSlot: Send + Sync {
    /// Stores `value` under `key` unless a later value is already stored.
    fn raise(&self, key: &str, value: Timestamp) -> StoreResult<()>;

    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Timestamp>>;

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
