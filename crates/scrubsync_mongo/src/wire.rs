//! Document shapes stored in the customer collections.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime;
use scrubsync_core::{Address, Record, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Postal address as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressDoc {
    /// First address line.
    #[serde(default)]
    pub line1: String,
    /// Second address line.
    #[serde(default)]
    pub line2: String,
    /// Postal code.
    #[serde(default)]
    pub postcode: String,
    /// City.
    #[serde(default)]
    pub city: String,
    /// Region or state.
    #[serde(default)]
    pub state: String,
    /// ISO country code.
    #[serde(default)]
    pub country: String,
}

/// Customer document as stored in the source and sink collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDoc {
    /// Document identity.
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Postal address.
    #[serde(default)]
    pub address: AddressDoc,
    /// Creation time.
    pub created_at: DateTime,
}

pub(crate) fn to_bson_datetime(timestamp: Timestamp) -> DateTime {
    DateTime::from_millis(timestamp.as_millis())
}

pub(crate) fn record_id(id: ObjectId) -> RecordId {
    RecordId::from_bytes(id.bytes())
}

impl From<CustomerDoc> for Record {
    fn from(doc: CustomerDoc) -> Self {
        Record {
            id: record_id(doc.id),
            first_name: doc.first_name,
            last_name: doc.last_name,
            email: doc.email,
            address: Address {
                line1: doc.address.line1,
                line2: doc.address.line2,
                postcode: doc.address.postcode,
                city: doc.address.city,
                state: doc.address.state,
                country: doc.address.country,
            },
            created_at: Timestamp::from_millis(doc.created_at.timestamp_millis()),
        }
    }
}

impl From<&Record> for CustomerDoc {
    fn from(record: &Record) -> Self {
        CustomerDoc {
            id: ObjectId::from_bytes(*record.id.as_bytes()),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            address: AddressDoc {
                line1: record.address.line1.clone(),
                line2: record.address.line2.clone(),
                postcode: record.address.postcode.clone(),
                city: record.address.city.clone(),
                state: record.address.state.clone(),
                country: record.address.country.clone(),
            },
            created_at: to_bson_datetime(record.created_at),
        }
    }
}
