//! Checkpoint slot backed by a MongoDB collection.

use crate::error::store_error;
use crate::wire::to_bson_datetime;
use mongodb::bson::{doc, Document};
use mongodb::options::UpdateOptions;
use mongodb::sync::Collection;
use scrubsync_core::{CheckpointSlot, StoreError, StoreResult, Timestamp};

/// Field holding the checkpoint value.
const VALUE_FIELD: &str = "timestamp";

/// Checkpoint documents of the form `{ _id: <key>, timestamp: <date> }`.
///
/// Writes use `$max` with upsert, so the server keeps the later of the
/// stored and the written value.
#[derive(Clone)]
pub struct MongoCheckpoints {
    collection: Collection<Document>,
}

impl MongoCheckpoints {
    /// Wraps a driver collection.
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }
}

impl CheckpointSlot for MongoCheckpoints {
    fn raise(&self, key: &str, value: Timestamp) -> StoreResult<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection
            .update_one(
                doc! { "_id": key },
                doc! { "$max": { "timestamp": to_bson_datetime(value) } },
                options,
            )
            .map_err(|e| store_error(e, StoreError::Query))?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Timestamp>> {
        let found = self
            .collection
            .find_one(doc! { "_id": key }, None)
            .map_err(|e| store_error(e, StoreError::Query))?;

        found
            .map(|doc| {
                doc.get_datetime(VALUE_FIELD)
                    .map(|dt| Timestamp::from_millis(dt.timestamp_millis()))
                    .map_err(|e| StoreError::Serialization(format!("checkpoint {key}: {e}")))
            })
            .transpose()
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.collection
            .delete_one(doc! { "_id": key }, None)
            .map_err(|e| store_error(e, StoreError::Query))?;
        Ok(())
    }
}
