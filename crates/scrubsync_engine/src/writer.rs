//! Idempotent bulk writes into the sink.

use crate::error::SyncResult;
use scrubsync_core::{Record, RecordSink, StoreError};
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, error};

/// Per-batch write accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records newly written.
    pub inserted: u64,
    /// Records already present in the sink.
    pub duplicates: u64,
    /// Records rejected for any other reason.
    pub failed: u64,
}

impl WriteSummary {
    /// Total number of records submitted.
    pub fn total(&self) -> u64 {
        self.inserted + self.duplicates + self.failed
    }
}

impl AddAssign for WriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }
}

/// Writes scrubbed records into the sink.
///
/// Inserts are unordered. A record rejected because its identity already
/// exists counts as written, which makes replaying any record harmless. Other
/// per-record rejections are logged and counted without aborting the batch.
/// A failure of the batch as a whole is returned to the caller.
pub struct BatchWriter<K: RecordSink> {
    sink: Arc<K>,
}

impl<K: RecordSink> BatchWriter<K> {
    /// Creates a writer over `sink`.
    pub fn new(sink: Arc<K>) -> Self {
        Self { sink }
    }

    /// Returns the underlying sink.
    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }

    /// Inserts `records`. Does nothing for an empty slice.
    pub fn write(&self, records: &[Record]) -> SyncResult<WriteSummary> {
        if records.is_empty() {
            return Ok(WriteSummary::default());
        }

        let summary = match self.sink.insert_many(records) {
            Ok(inserted) => WriteSummary {
                inserted,
                ..WriteSummary::default()
            },
            Err(StoreError::BulkWrite { inserted, failures }) => {
                let mut summary = WriteSummary {
                    inserted,
                    ..WriteSummary::default()
                };
                for failure in &failures {
                    if failure.is_duplicate_key() {
                        summary.duplicates += 1;
                        continue;
                    }
                    summary.failed += 1;
                    let id = records.get(failure.index).map(|r| r.id.to_string());
                    error!(
                        record = id.as_deref().unwrap_or("?"),
                        code = failure.code,
                        "failed to insert record: {}",
                        failure.message
                    );
                }
                summary
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "batch written"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use scrubsync_core::{MemoryCollection, RecordGenerator};

    fn writer() -> BatchWriter<MemoryCollection> {
        BatchWriter::new(Arc::new(MemoryCollection::new("anonymized_customers")))
    }

    #[test]
    fn empty_batch_is_noop() {
        let writer = writer();
        writer.sink().set_unavailable(true);
        assert_eq!(writer.write(&[]).unwrap(), WriteSummary::default());
    }

    #[test]
    fn replay_is_idempotent() {
        let writer = writer();
        let batch = RecordGenerator::seeded(11).batch(5);

        let first = writer.write(&batch).unwrap();
        assert_eq!(first.inserted, 5);
        let snapshot = writer.sink().records();

        let second = writer.write(&batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 5);
        assert_eq!(writer.sink().records(), snapshot);
    }

    #[test]
    fn partial_replay_writes_the_rest() {
        let writer = writer();
        let batch = RecordGenerator::seeded(12).batch(4);
        writer.write(&batch[..2]).unwrap();

        let summary = writer.write(&batch).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(writer.sink().len(), 4);
    }

    #[test]
    fn record_failures_do_not_abort_batch() {
        let writer = writer();
        let batch = RecordGenerator::seeded(13).batch(3);
        writer.sink().reject(batch[1].id, "document failed validation");

        let summary = writer.write(&batch).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 3);
        assert!(writer.sink().get(&batch[1].id).is_none());
    }

    #[test]
    fn bulk_failures_propagate() {
        let writer = writer();
        writer.sink().set_unavailable(true);

        let result = writer.write(&RecordGenerator::seeded(14).batch(2));
        assert!(matches!(
            result,
            Err(SyncError::Store(StoreError::Connection(_)))
        ));
    }
}
