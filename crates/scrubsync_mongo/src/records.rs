//! Source and sink collections.

use crate::error::store_error;
use crate::wire::{record_id, to_bson_datetime, CustomerDoc};
use mongodb::bson::{doc, Document};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType};
use mongodb::error::ErrorKind;
use mongodb::options::{ChangeStreamOptions, FindOptions, FullDocumentType, InsertManyOptions};
use mongodb::sync::Collection;
use scrubsync_core::{
    ChangeEvent, ChangeStream, FeedFilter, OperationKind, Record, RecordCursor, RecordSink,
    RecordSource, StoreError, StoreResult, Timestamp, WriteFailure,
};
use tracing::{debug, warn};

/// A customer collection, usable as source or sink.
#[derive(Clone)]
pub struct MongoRecords {
    collection: Collection<CustomerDoc>,
}

impl MongoRecords {
    /// Wraps a driver collection.
    pub fn new(collection: Collection<CustomerDoc>) -> Self {
        Self { collection }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    fn cursor(
        &self,
        filter: Option<Document>,
        options: Option<FindOptions>,
    ) -> StoreResult<RecordCursor> {
        let cursor = self
            .collection
            .find(filter, options)
            .map_err(|e| store_error(e, StoreError::Query))?;
        Ok(Box::new(cursor.map(|doc| {
            doc.map(Record::from)
                .map_err(|e| store_error(e, StoreError::Query))
        })))
    }
}

impl RecordSource for MongoRecords {
    fn find_all(&self) -> StoreResult<RecordCursor> {
        self.cursor(None, None)
    }

    fn find_since(&self, since: Timestamp) -> StoreResult<RecordCursor> {
        let filter = doc! { "createdAt": { "$gte": to_bson_datetime(since) } };
        let options = FindOptions::builder().sort(doc! { "createdAt": 1 }).build();
        self.cursor(Some(filter), Some(options))
    }

    fn watch(&self, filter: &FeedFilter) -> StoreResult<ChangeStream> {
        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .build();
        let stream = self
            .collection
            .watch(watch_pipeline(filter), options)
            .map_err(|e| store_error(e, StoreError::Feed))?;

        Ok(Box::new(stream.filter_map(|event| match event {
            Ok(event) => change_event(event).map(Ok),
            Err(e) => Some(Err(store_error(e, StoreError::Feed))),
        })))
    }
}

impl RecordSink for MongoRecords {
    fn insert_many(&self, records: &[Record]) -> StoreResult<u64> {
        let options = InsertManyOptions::builder().ordered(false).build();
        let err = match self
            .collection
            .insert_many(records.iter().map(CustomerDoc::from), options)
        {
            Ok(result) => return Ok(result.inserted_ids.len() as u64),
            Err(err) => err,
        };

        // Per-record rejections only; a write concern error fails the batch.
        let failures: Option<Vec<WriteFailure>> = match err.kind.as_ref() {
            ErrorKind::BulkWrite(failure) if failure.write_concern_error.is_none() => {
                failure.write_errors.as_ref().map(|errors| {
                    errors
                        .iter()
                        .map(|e| WriteFailure::new(e.index, e.code, e.message.clone()))
                        .collect()
                })
            }
            _ => None,
        };

        match failures {
            Some(failures) => Err(StoreError::BulkWrite {
                inserted: records.len().saturating_sub(failures.len()) as u64,
                failures,
            }),
            None => Err(store_error(err, StoreError::Query)),
        }
    }
}

/// Builds the server-side filter for a change stream.
///
/// Record-carrying events must have a post-image created at or after
/// `filter.since`; deletes and drops pass on kind alone.
pub(crate) fn watch_pipeline(filter: &FeedFilter) -> Vec<Document> {
    let mut kinds: Vec<&str> = filter.kinds.iter().map(|k| k.as_str()).collect();
    if filter.kinds.contains(&OperationKind::Update) {
        kinds.push("replace");
    }
    let recordless: Vec<&str> = filter
        .kinds
        .iter()
        .filter(|k| !k.carries_record())
        .map(|k| k.as_str())
        .collect();

    vec![doc! {
        "$match": {
            "operationType": { "$in": kinds },
            "$or": [
                { "fullDocument.createdAt": { "$gte": to_bson_datetime(filter.since) } },
                { "operationType": { "$in": recordless } },
            ],
        }
    }]
}

fn change_event(event: ChangeStreamEvent<CustomerDoc>) -> Option<ChangeEvent> {
    change_from_parts(
        &event.operation_type,
        event.full_document,
        event.document_key.as_ref(),
    )
}

/// Maps the parts of a stream event that matter here to a [`ChangeEvent`].
///
/// Returns `None` for event kinds the mirror does not handle.
pub(crate) fn change_from_parts(
    operation: &OperationType,
    full_document: Option<CustomerDoc>,
    document_key: Option<&Document>,
) -> Option<ChangeEvent> {
    match operation {
        OperationType::Insert | OperationType::Update | OperationType::Replace => {
            let Some(doc) = full_document else {
                warn!(?operation, "change event without a post-image skipped");
                return None;
            };
            let record = Record::from(doc);
            Some(match operation {
                OperationType::Insert => ChangeEvent::Insert(record),
                _ => ChangeEvent::Update(record),
            })
        }
        OperationType::Delete => {
            let id = document_key
                .and_then(|key| key.get_object_id("_id").ok())
                .map(record_id);
            Some(ChangeEvent::Delete { id })
        }
        OperationType::Drop => Some(ChangeEvent::CollectionDrop),
        OperationType::DropDatabase => Some(ChangeEvent::DatabaseDrop),
        other => {
            debug!(operation = ?other, "change event skipped");
            None
        }
    }
}
