//! Test fixtures for mirror scenarios.
//!
//! Fixtures panic on setup failures; they are meant for tests only.

use parking_lot::Mutex;
use scrubsync_core::{
    anonymize, MemoryCheckpoints, MemoryCollection, Record, RecordGenerator, Timestamp,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Name of the source collection in fixtures.
pub const SOURCE_COLLECTION: &str = "customers";

/// Name of the sink collection in fixtures.
pub const SINK_COLLECTION: &str = "anonymized_customers";

/// In-memory source, sink and checkpoint slot for one scenario.
pub struct TestMirror {
    /// Collection holding the original records.
    pub source: Arc<MemoryCollection>,
    /// Collection receiving scrubbed records.
    pub sink: Arc<MemoryCollection>,
    /// Checkpoint slot.
    pub checkpoints: Arc<MemoryCheckpoints>,
    generator: Mutex<RecordGenerator>,
}

impl TestMirror {
    /// Creates an empty mirror with a fixed generator seed.
    pub fn new() -> Self {
        Self::seeded(0x5eed)
    }

    /// Creates an empty mirror whose records derive from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Arc::new(MemoryCollection::new(SOURCE_COLLECTION)),
            sink: Arc::new(MemoryCollection::new(SINK_COLLECTION)),
            checkpoints: Arc::new(MemoryCheckpoints::new()),
            generator: Mutex::new(RecordGenerator::seeded(seed)),
        }
    }

    /// Builds a record created at `millis` without storing it.
    pub fn record_at(&self, millis: i64) -> Record {
        self.generator.lock().record_at(Timestamp::from_millis(millis))
    }

    /// Inserts one record per timestamp into the source, publishing events.
    pub fn seed_at(&self, millis: &[i64]) -> Vec<Record> {
        millis
            .iter()
            .map(|&m| {
                let record = self.record_at(m);
                self.source
                    .insert(record.clone())
                    .expect("Failed to insert fixture record");
                record
            })
            .collect()
    }

    /// Stores one record per timestamp in the source without publishing events.
    pub fn seed_silently_at(&self, millis: &[i64]) -> Vec<Record> {
        let records: Vec<Record> = millis.iter().map(|&m| self.record_at(m)).collect();
        self.source.seed(records.clone());
        records
    }

    /// Returns true if the sink holds the scrubbed form of `record`.
    pub fn mirrors(&self, record: &Record) -> bool {
        self.sink.get(&record.id) == Some(anonymize(record))
    }

    /// Panics unless every record is mirrored.
    pub fn assert_mirrored(&self, records: &[Record]) {
        for record in records {
            assert!(self.mirrors(record), "record {} is not mirrored", record.id);
        }
    }

    /// Blocks until the source has `count` feed subscribers.
    ///
    /// Panics after five seconds.
    pub fn wait_for_subscribers(&self, count: usize) {
        wait_until(Duration::from_secs(5), || {
            self.source.feed().subscriber_count() == count
        });
    }
}

impl Default for TestMirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {timeout:?}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrubsync_core::{FeedFilter, RecordSource};

    #[test]
    fn seeded_mirrors_are_reproducible() {
        let a = TestMirror::seeded(3);
        let b = TestMirror::seeded(3);
        assert_eq!(a.record_at(10), b.record_at(10));
    }

    #[test]
    fn seed_at_publishes_and_silent_seed_does_not() {
        let mirror = TestMirror::new();
        let stream = mirror
            .source
            .watch(&FeedFilter::since(Timestamp::EPOCH))
            .unwrap();

        mirror.seed_at(&[1, 2]);
        mirror.seed_silently_at(&[3]);
        mirror.source.feed().close();

        assert_eq!(stream.count(), 2);
        assert_eq!(mirror.source.len(), 3);
    }

    #[test]
    fn mirrors_checks_scrubbed_form() {
        let mirror = TestMirror::new();
        let record = mirror.record_at(5);
        assert!(!mirror.mirrors(&record));

        mirror.sink.insert(record.clone()).unwrap();
        assert!(!mirror.mirrors(&record));
    }
}
