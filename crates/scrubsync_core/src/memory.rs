//! In-memory collections for testing.

use crate::change::{ChangeEvent, FeedFilter};
use crate::error::{StoreError, StoreResult, WriteFailure};
use crate::feed::ChangeFeed;
use crate::record::{Record, RecordId, Timestamp};
use crate::store::{ChangeStream, CheckpointSlot, RecordCursor, RecordSink, RecordSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Server code reported for a record rejected by [`MemoryCollection::reject`].
const VALIDATION_FAILED_CODE: i32 = 121;

/// An in-memory record collection with a live change feed.
///
/// Records keep insertion order, which is the storage order reported by
/// [`RecordSource::find_all`]. Every mutation made through this type, including
/// [`RecordSink::insert_many`], is published on its [`ChangeFeed`].
///
/// # Fault injection
///
/// - [`set_unavailable`](Self::set_unavailable) fails every call with a connection error
/// - [`reject`](Self::reject) makes bulk inserts refuse one record with a non-duplicate error
///
/// # Example
///
/// ```rust
/// use scrubsync_core::{MemoryCollection, RecordSink, RecordGenerator};
///
/// let sink = MemoryCollection::new("anonymized_customers");
/// let batch = RecordGenerator::seeded(7).batch(3);
///
/// assert_eq!(sink.insert_many(&batch).unwrap(), 3);
/// assert!(sink.insert_many(&batch).is_err()); // all duplicates
/// assert_eq!(sink.len(), 3);
/// ```
#[derive(Default)]
pub struct MemoryCollection {
    name: String,
    records: RwLock<Vec<Record>>,
    rejected: RwLock<HashMap<RecordId, String>>,
    unavailable: AtomicBool,
    feed: ChangeFeed,
}

impl MemoryCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the change feed of this collection.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Returns a snapshot of all records in storage order.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Looks up a record by identity.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().iter().find(|r| r.id == *id).cloned()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Makes every subsequent call fail with [`StoreError::Connection`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes bulk inserts refuse the record with identity `id`.
    pub fn reject(&self, id: RecordId, message: impl Into<String>) {
        self.rejected.write().insert(id, message.into());
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Connection(format!("{} is unavailable", self.name)))
        } else {
            Ok(())
        }
    }

    /// Inserts a single record and publishes an insert event.
    ///
    /// # Errors
    ///
    /// Fails with a duplicate-key [`StoreError::BulkWrite`] if the identity exists.
    pub fn insert(&self, record: Record) -> StoreResult<()> {
        self.insert_many(std::slice::from_ref(&record)).map(|_| ())
    }

    /// Stores records without publishing events.
    ///
    /// Stands in for writes that happened while nobody was watching, such as
    /// during a feed outage. Identities already present are skipped.
    pub fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut stored = self.records.write();
        for record in records {
            if !stored.iter().any(|r| r.id == record.id) {
                stored.push(record);
            }
        }
    }

    /// Replaces a stored record and publishes an update event.
    ///
    /// Inserts the record if its identity is unknown.
    pub fn update(&self, record: Record) -> StoreResult<()> {
        self.check_available()?;
        {
            let mut records = self.records.write();
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        }
        self.feed.emit(ChangeEvent::Update(record));
        Ok(())
    }

    /// Deletes a record and publishes a delete event.
    ///
    /// Returns true if the record existed.
    pub fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        self.check_available()?;
        let removed = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|r| r.id != *id);
            records.len() != before
        };
        self.feed.emit(ChangeEvent::Delete { id: Some(*id) });
        Ok(removed)
    }

    /// Removes every record and publishes a collection-drop event.
    pub fn drop_collection(&self) -> StoreResult<()> {
        self.check_available()?;
        self.records.write().clear();
        self.feed.emit(ChangeEvent::CollectionDrop);
        Ok(())
    }

    /// Publishes a database-drop event and removes every record.
    pub fn drop_database(&self) -> StoreResult<()> {
        self.check_available()?;
        self.records.write().clear();
        self.feed.emit(ChangeEvent::DatabaseDrop);
        Ok(())
    }
}

impl RecordSource for MemoryCollection {
    fn find_all(&self) -> StoreResult<RecordCursor> {
        self.check_available()?;
        Ok(Box::new(self.records().into_iter().map(Ok)))
    }

    fn find_since(&self, since: Timestamp) -> StoreResult<RecordCursor> {
        self.check_available()?;
        let mut matched: Vec<Record> = self
            .records
            .read()
            .iter()
            .filter(|r| r.created_at >= since)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.created_at);
        Ok(Box::new(matched.into_iter().map(Ok)))
    }

    fn watch(&self, filter: &FeedFilter) -> StoreResult<ChangeStream> {
        self.check_available()?;
        Ok(Box::new(self.feed.subscribe(filter.clone()).into_iter()))
    }
}

impl RecordSink for MemoryCollection {
    fn insert_many(&self, records: &[Record]) -> StoreResult<u64> {
        self.check_available()?;

        let mut failures = Vec::new();
        let mut written = Vec::new();
        {
            let rejected = self.rejected.read();
            let mut stored = self.records.write();
            for (index, record) in records.iter().enumerate() {
                if let Some(message) = rejected.get(&record.id) {
                    failures.push(WriteFailure::new(index, VALIDATION_FAILED_CODE, message.clone()));
                } else if stored.iter().any(|r| r.id == record.id) {
                    failures.push(WriteFailure::duplicate(index));
                } else {
                    stored.push(record.clone());
                    written.push(record.clone());
                }
            }
        }

        let inserted = written.len() as u64;
        for record in written {
            self.feed.emit(ChangeEvent::Insert(record));
        }

        if failures.is_empty() {
            Ok(inserted)
        } else {
            Err(StoreError::BulkWrite { inserted, failures })
        }
    }
}

/// An in-memory checkpoint slot for testing.
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    values: RwLock<HashMap<String, Timestamp>>,
    unavailable: AtomicBool,
}

impl MemoryCheckpoints {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot already holding `value` under `key`.
    pub fn with_value(key: &str, value: Timestamp) -> Self {
        let slot = Self::new();
        slot.values.write().insert(key.to_owned(), value);
        slot
    }

    /// Returns the stored value without going through the failure switch.
    pub fn peek(&self, key: &str) -> Option<Timestamp> {
        self.values.read().get(key).copied()
    }

    /// Makes every subsequent call fail with [`StoreError::Connection`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Connection("checkpoint store is unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl CheckpointSlot for MemoryCheckpoints {
    fn raise(&self, key: &str, value: Timestamp) -> StoreResult<()> {
        self.check_available()?;
        let mut values = self.values.write();
        let entry = values.entry(key.to_owned()).or_insert(value);
        if *entry < value {
            *entry = value;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Timestamp>> {
        self.check_available()?;
        Ok(self.values.read().get(key).copied())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.values.write().remove(key);
        Ok(())
    }
}
