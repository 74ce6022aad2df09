//! Live change feed application.

use crate::checkpoint::CheckpointStore;
use crate::error::SyncResult;
use crate::writer::{BatchWriter, WriteSummary};
use scrubsync_core::{
    anonymize, ChangeEvent, ChangeStream, CheckpointSlot, FeedFilter, RecordSink, RecordSource,
    Timestamp,
};
use tracing::{error, info, warn};

/// What happened to a single change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The scrubbed record was written and its timestamp checkpointed.
    Applied {
        /// Creation timestamp of the applied record.
        created_at: Timestamp,
        /// Write accounting for the single-record batch.
        written: WriteSummary,
    },
    /// The event was logged and left the sink untouched.
    Ignored,
}

/// Accounting for one feed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Insert and update events written to the sink.
    pub applied: u64,
    /// Delete and drop events observed.
    pub ignored: u64,
    /// Write accounting across applied events.
    pub written: WriteSummary,
    /// Newest creation timestamp applied in this session.
    pub last_applied: Option<Timestamp>,
}

/// Applies source change events to the sink one at a time.
///
/// Each insert or update is anonymized, written as a single-record batch and
/// checkpointed before the next event is read. Deletes and drops are logged
/// and never propagated: the sink is an append/upsert mirror.
pub struct ChangeSubscriber<'a, S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    source: &'a S,
    writer: &'a BatchWriter<K>,
    checkpoints: &'a CheckpointStore<C>,
}

impl<'a, S, K, C> ChangeSubscriber<'a, S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    /// Creates a subscriber.
    pub fn new(
        source: &'a S,
        writer: &'a BatchWriter<K>,
        checkpoints: &'a CheckpointStore<C>,
    ) -> Self {
        Self {
            source,
            writer,
            checkpoints,
        }
    }

    /// Opens the feed from `since` and applies events until it ends.
    ///
    /// Blocks for as long as the feed stays open. Progress made before an
    /// error is recorded in `report`.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session: failing to open the feed,
    /// a feed error, or a sink failure while applying an event.
    pub fn start(&self, since: Timestamp, report: &mut FeedReport) -> SyncResult<()> {
        let stream = self.source.watch(&FeedFilter::since(since))?;
        info!(%since, "realtime sync started");
        self.consume(stream, report)
    }

    /// Applies every event of an already open stream, in delivery order.
    pub fn consume(&self, stream: ChangeStream, report: &mut FeedReport) -> SyncResult<()> {
        for event in stream {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "error in change stream");
                    return Err(e.into());
                }
            };

            match self.apply(event)? {
                EventOutcome::Applied {
                    created_at,
                    written,
                } => {
                    report.applied += 1;
                    report.written += written;
                    report.last_applied = report.last_applied.max(Some(created_at));
                }
                EventOutcome::Ignored => report.ignored += 1,
            }
        }

        info!(
            applied = report.applied,
            ignored = report.ignored,
            "change stream closed"
        );
        Ok(())
    }

    /// Applies a single event.
    pub fn apply(&self, event: ChangeEvent) -> SyncResult<EventOutcome> {
        match event {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => {
                let created_at = record.created_at;
                let written = match self.writer.write(&[anonymize(&record)]) {
                    Ok(written) => written,
                    Err(e) => {
                        error!(record = %record.id, error = %e, "error processing change event");
                        return Err(e);
                    }
                };
                self.checkpoints.save(created_at);
                Ok(EventOutcome::Applied {
                    created_at,
                    written,
                })
            }
            ChangeEvent::Delete { id } => {
                match id {
                    Some(id) => info!(record = %id, "delete not propagated to sink"),
                    None => info!("delete not propagated to sink"),
                }
                Ok(EventOutcome::Ignored)
            }
            ChangeEvent::CollectionDrop => {
                warn!("source collection dropped; sink left untouched");
                Ok(EventOutcome::Ignored)
            }
            ChangeEvent::DatabaseDrop => {
                warn!("source database dropped; sink left untouched");
                Ok(EventOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CHECKPOINT_KEY;
    use crate::error::SyncError;
    use scrubsync_core::{MemoryCheckpoints, MemoryCollection, RecordGenerator, StoreError};
    use std::sync::Arc;

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

        fn subscriber(
            &self,
        ) -> ChangeSubscriber<'_, MemoryCollection, MemoryCollection, MemoryCheckpoints> {
            ChangeSubscriber::new(&self.source, &self.writer, &self.checkpoints)
        }
    }

    #[test]
    fn inserts_and_updates_are_applied_and_checkpointed() {
        let fx = Fixture::new();
        let mut gen = RecordGenerator::seeded(21);
        let stream = fx.source.watch(&FeedFilter::since(Timestamp::EPOCH)).unwrap();

        let first = gen.record_at(Timestamp::from_millis(1_000));
        let second = gen.record_at(Timestamp::from_millis(2_000));
        fx.source.insert(first.clone()).unwrap();
        fx.source.insert(second.clone()).unwrap();
        fx.source.update(first.clone()).unwrap();
        fx.source.feed().close();

        let mut report = FeedReport::default();
        fx.subscriber().consume(stream, &mut report).unwrap();

        assert_eq!(report.applied, 3);
        assert_eq!(report.written.inserted, 2);
        assert_eq!(report.written.duplicates, 1);
        assert_eq!(report.last_applied, Some(Timestamp::from_millis(2_000)));
        assert_eq!(fx.writer.sink().get(&first.id), Some(anonymize(&first)));
        assert_eq!(fx.checkpoints.load(), Some(Timestamp::from_millis(2_000)));
    }

    #[test]
    fn deletes_are_not_propagated() {
        let fx = Fixture::new();
        let record = RecordGenerator::seeded(22).record_at(Timestamp::from_millis(5_000));
        fx.source.insert(record.clone()).unwrap();
        fx.writer.write(&[anonymize(&record)]).unwrap();

        let stream = fx.source.watch(&FeedFilter::since(Timestamp::EPOCH)).unwrap();
        fx.source.delete(&record.id).unwrap();
        fx.source.drop_collection().unwrap();
        fx.source.drop_database().unwrap();
        fx.source.feed().close();

        let mut report = FeedReport::default();
        fx.subscriber().consume(stream, &mut report).unwrap();

        assert_eq!(report.ignored, 3);
        assert_eq!(report.applied, 0);
        assert_eq!(fx.writer.sink().get(&record.id), Some(anonymize(&record)));
        assert_eq!(fx.checkpoints.load(), None);
    }

    #[test]
    fn events_before_since_are_filtered() {
        let fx = Fixture::new();
        let mut gen = RecordGenerator::seeded(23);
        let stream = fx
            .source
            .watch(&FeedFilter::since(Timestamp::from_millis(10_000)))
            .unwrap();

        fx.source.insert(gen.record_at(Timestamp::from_millis(9_999))).unwrap();
        fx.source.insert(gen.record_at(Timestamp::from_millis(10_000))).unwrap();
        fx.source.feed().close();

        let mut report = FeedReport::default();
        fx.subscriber().consume(stream, &mut report).unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(fx.writer.sink().len(), 1);
    }

    #[test]
    fn feed_error_ends_session_with_progress_recorded() {
        let fx = Fixture::new();
        let stream = fx.source.watch(&FeedFilter::since(Timestamp::EPOCH)).unwrap();

        fx.source
            .insert(RecordGenerator::seeded(24).record_at(Timestamp::from_millis(3_000)))
            .unwrap();
        fx.source.feed().fail("cursor killed");

        let mut report = FeedReport::default();
        let err = fx.subscriber().consume(stream, &mut report).unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::Feed(_))));
        assert_eq!(report.applied, 1);
        assert_eq!(report.last_applied, Some(Timestamp::from_millis(3_000)));
    }

    #[test]
    fn sink_failure_aborts_without_checkpoint() {
        let fx = Fixture::new();
        let record = RecordGenerator::seeded(25).record_at(Timestamp::from_millis(4_000));
        fx.writer.sink().set_unavailable(true);

        let err = fx.subscriber().apply(ChangeEvent::Insert(record)).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(fx.checkpoints.load(), None);
    }

    #[test]
    fn start_fails_when_source_is_down() {
        let fx = Fixture::new();
        fx.source.set_unavailable(true);

        let mut report = FeedReport::default();
        assert!(fx.subscriber().start(Timestamp::EPOCH, &mut report).is_err());
        assert_eq!(report, FeedReport::default());
    }
}
