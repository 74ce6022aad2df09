//! Full sync and catch-up scans.

use crate::checkpoint::CheckpointStore;
use crate::error::SyncResult;
use crate::writer::{BatchWriter, WriteSummary};
use scrubsync_core::{
    anonymize, CheckpointSlot, Record, RecordCursor, RecordSink, RecordSource, Timestamp,
};
use tracing::{debug, info};

/// Result of a completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Source records read.
    pub scanned: u64,
    /// Sink write accounting.
    pub written: WriteSummary,
    /// Newest creation timestamp seen, if any record was read.
    pub max_timestamp: Option<Timestamp>,
}

/// Copies source records into the sink in fixed-size batches.
pub struct Scanner<'a, S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    source: &'a S,
    writer: &'a BatchWriter<K>,
    checkpoints: &'a CheckpointStore<C>,
    batch_size: usize,
}

impl<'a, S, K, C> Scanner<'a, S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    /// Creates a scanner.
    pub fn new(
        source: &'a S,
        writer: &'a BatchWriter<K>,
        checkpoints: &'a CheckpointStore<C>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            writer,
            checkpoints,
            batch_size: batch_size.max(1),
        }
    }

    /// Mirrors the whole source.
    ///
    /// Clears the checkpoint first and persists the newest creation timestamp
    /// seen once every batch is written. Storage order is not creation order,
    /// so no checkpoint is written mid-scan: an interrupted full sync leaves no
    /// checkpoint and the next start repeats it.
    pub fn full_sync(&self) -> SyncResult<ScanReport> {
        info!("full sync started");
        self.checkpoints.clear();

        let report = self.drain(self.source.find_all()?, false)?;
        if let Some(max) = report.max_timestamp {
            self.checkpoints.save(max);
        }

        info!(
            scanned = report.scanned,
            inserted = report.written.inserted,
            duplicates = report.written.duplicates,
            failed = report.written.failed,
            "full sync completed"
        );
        Ok(report)
    }

    /// Mirrors records created at or after `since`.
    ///
    /// Keeps any existing checkpoint. Records arrive oldest first, so the
    /// checkpoint advances after every flushed batch; at the end it is set to
    /// the newest timestamp seen, or to `since` if nothing matched.
    pub fn catch_up(&self, since: Timestamp) -> SyncResult<ScanReport> {
        info!(%since, "catch-up started");

        let report = self.drain(self.source.find_since(since)?, true)?;
        self.checkpoints.save(report.max_timestamp.unwrap_or(since));

        info!(
            scanned = report.scanned,
            inserted = report.written.inserted,
            duplicates = report.written.duplicates,
            failed = report.written.failed,
            "catch-up completed"
        );
        Ok(report)
    }

    fn drain(&self, cursor: RecordCursor, checkpoint_batches: bool) -> SyncResult<ScanReport> {
        let mut report = ScanReport::default();
        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);

        for record in cursor {
            let record = record?;
            report.scanned += 1;
            report.max_timestamp = report.max_timestamp.max(Some(record.created_at));
            batch.push(anonymize(&record));

            if batch.len() == self.batch_size {
                self.flush(&mut batch, &mut report, checkpoint_batches)?;
            }
        }

        self.flush(&mut batch, &mut report, checkpoint_batches)?;
        Ok(report)
    }

    fn flush(
        &self,
        batch: &mut Vec<Record>,
        report: &mut ScanReport,
        checkpoint: bool,
    ) -> SyncResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        report.written += self.writer.write(batch)?;
        debug!(size = batch.len(), scanned = report.scanned, "batch flushed");
        batch.clear();

        if checkpoint {
            if let Some(max) = report.max_timestamp {
                self.checkpoints.save(max);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CHECKPOINT_KEY;
    use scrubsync_core::{MemoryCheckpoints, MemoryCollection, RecordGenerator, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingSink {
        inner: MemoryCollection,
        batches: AtomicUsize,
    }

    impl RecordSink for CountingSink {
        fn insert_many(&self, records: &[Record]) -> scrubsync_core::StoreResult<u64> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_many(records)
        }
    }

    struct Fixture {
        source: MemoryCollection,
        writer: BatchWriter<MemoryCollection>,
        checkpoints: CheckpointStore<MemoryCheckpoints>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                source: MemoryCollection::new("customers"),
                writer: BatchWriter::new(Arc::new(MemoryCollection::new("anonymized"))),
                checkpoints: CheckpointStore::new(
                    Arc::new(MemoryCheckpoints::new()),
                    CHECKPOINT_KEY,
                ),
            }
        }

        fn scanner(
            &self,
            batch_size: usize,
        ) -> Scanner<'_, MemoryCollection, MemoryCollection, MemoryCheckpoints> {
            Scanner::new(&self.source, &self.writer, &self.checkpoints, batch_size)
        }

        fn seed(&self, millis: &[i64]) -> Vec<Record> {
            let mut gen = RecordGenerator::seeded(millis.len() as u64);
            millis
                .iter()
                .map(|&m| {
                    let record = gen.record_at(Timestamp::from_millis(m));
                    self.source.insert(record.clone()).unwrap();
                    record
                })
                .collect()
        }
    }

    #[test]
    fn full_sync_copies_everything_and_checkpoints_max() {
        let fx = Fixture::new();
        let records = fx.seed(&[5_000, 9_000, 1_000, 7_000, 3_000]);

        let report = fx.scanner(2).full_sync().unwrap();

        assert_eq!(report.scanned, 5);
        assert_eq!(report.written.inserted, 5);
        assert_eq!(report.max_timestamp, Some(Timestamp::from_millis(9_000)));
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(9_000)));

        let sink = fx.writer.sink();
        for record in &records {
            assert_eq!(sink.get(&record.id), Some(anonymize(record)));
        }
    }

    #[test]
    fn batch_multiple_leaves_nothing_to_flush() {
        let fx = Fixture::new();
        let records = fx.seed(&[4_000, 2_000, 3_000, 1_000]);
        let writer = BatchWriter::new(Arc::new(CountingSink::default()));
        let scanner = Scanner::new(&fx.source, &writer, &fx.checkpoints, 2);

        let report = scanner.full_sync().unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.written.inserted, 4);
        assert_eq!(writer.sink().batches.load(Ordering::SeqCst), 2);
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(4_000)));

        let report = scanner.catch_up(Timestamp::from_millis(1_000)).unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.written.duplicates, 4);
        assert_eq!(writer.sink().batches.load(Ordering::SeqCst), 4);
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(4_000)));

        let sink = &writer.sink().inner;
        for record in &records {
            assert_eq!(sink.get(&record.id), Some(anonymize(record)));
        }
    }

    #[test]
    fn full_sync_clears_stale_checkpoint() {
        let fx = Fixture::new();
        fx.checkpoints.save(Timestamp::from_millis(99_000));
        fx.seed(&[1_000, 2_000]);

        fx.scanner(10).full_sync().unwrap();
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(2_000)));
    }

    #[test]
    fn full_sync_of_empty_source_leaves_no_checkpoint() {
        let fx = Fixture::new();
        fx.checkpoints.save(Timestamp::from_millis(1));

        let report = fx.scanner(10).full_sync().unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(fx.checkpoints.load(), None);
    }

    #[test]
    fn full_sync_is_repeatable() {
        let fx = Fixture::new();
        fx.seed(&[1_000, 2_000, 3_000]);

        fx.scanner(2).full_sync().unwrap();
        let report = fx.scanner(2).full_sync().unwrap();

        assert_eq!(report.written.inserted, 0);
        assert_eq!(report.written.duplicates, 3);
        assert_eq!(fx.writer.sink().len(), 3);
    }

    #[test]
    fn catch_up_picks_up_missed_records() {
        let fx = Fixture::new();
        let checkpoint = Timestamp::from_millis(1_000_000);
        let records = fx.seed(&[500_000, 940_000, 990_000]);
        fx.checkpoints.save(checkpoint);

        let since = checkpoint.saturating_sub(std::time::Duration::from_secs(120));
        let report = fx.scanner(10).catch_up(since).unwrap();

        assert_eq!(report.scanned, 2);
        assert!(fx.writer.sink().get(&records[0].id).is_none());
        assert!(fx.writer.sink().get(&records[1].id).is_some());
        assert!(fx.writer.sink().get(&records[2].id).is_some());
        assert_eq!(fx.checkpoints.load(), Some(checkpoint));
    }

    #[test]
    fn catch_up_without_matches_keeps_checkpoint() {
        let fx = Fixture::new();
        fx.checkpoints.save(Timestamp::from_millis(200_000));

        let report = fx.scanner(10).catch_up(Timestamp::from_millis(80_000)).unwrap();
        assert_eq!(report.max_timestamp, None);
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(200_000)));
    }

    #[test]
    fn catch_up_without_checkpoint_stores_since() {
        let fx = Fixture::new();
        fx.scanner(10).catch_up(Timestamp::from_millis(80_000)).unwrap();
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(80_000)));
    }

    #[test]
    fn failed_catch_up_leaves_checkpoint_untouched() {
        let fx = Fixture::new();
        fx.seed(&[1_000, 2_000, 3_000]);
        fx.writer.sink().set_unavailable(true);

        assert!(fx.scanner(2).catch_up(Timestamp::EPOCH).is_err());
        assert_eq!(fx.checkpoints.load(), None);

        fx.writer.sink().set_unavailable(false);
        fx.scanner(2).catch_up(Timestamp::EPOCH).unwrap();
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(3_000)));
    }

    #[test]
    fn source_failure_aborts_scan() {
        let fx = Fixture::new();
        fx.source.set_unavailable(true);

        let err = fx.scanner(10).full_sync().unwrap_err();
        assert!(matches!(
            err,
            crate::SyncError::Store(StoreError::Connection(_))
        ));
    }
}
