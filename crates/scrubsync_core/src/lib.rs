//! # scrubsync core
//!
//! Record model, anonymizer and storage seams for scrubsync.
//!
//! This crate provides:
//! - The customer [`Record`] model and its identity/timestamp types
//! - The deterministic field [`anonymize`] function
//! - The [`ChangeEvent`] sum type delivered by change feeds
//! - Storage traits ([`RecordSource`], [`RecordSink`], [`CheckpointSlot`])
//! - An in-memory backend with a live change feed
//! - A synthetic record generator for demos and load
//!
//! ## Design Principles
//!
//! - Backends are dumb collections; all sync reasoning lives in `scrubsync_engine`
//! - Record identity is preserved through anonymization
//! - `created_at` is immutable and is the only ordering key
//!
//! ## Example
//!
//! ```rust
//! use scrubsync_core::{anonymize, Address, Record, RecordId, Timestamp};
//!
//! let record = Record {
//!     id: RecordId::new(),
//!     first_name: "Ada".into(),
//!     last_name: "Lovelace".into(),
//!     email: "ada@example.com".into(),
//!     address: Address::default(),
//!     created_at: Timestamp::from_millis(1_700_000_000_000),
//! };
//!
//! let scrubbed = anonymize(&record);
//! assert_eq!(scrubbed.id, record.id);
//! assert!(scrubbed.email.ends_with("@example.com"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod anonymize;
mod change;
mod error;
mod feed;
pub mod generator;
mod memory;
mod record;
mod store;

pub use anonymize::{anonymize, anonymize_email, anonymize_value, PSEUDONYM_LEN};
pub use change::{ChangeEvent, FeedFilter, OperationKind};
pub use error::{StoreError, StoreResult, WriteFailure, DUPLICATE_KEY_CODE};
pub use feed::ChangeFeed;
pub use generator::RecordGenerator;
pub use memory::{MemoryCheckpoints, MemoryCollection};
pub use record::{Address, ParseRecordIdError, Record, RecordId, Timestamp};
pub use store::{ChangeStream, CheckpointSlot, RecordCursor, RecordSink, RecordSource};
