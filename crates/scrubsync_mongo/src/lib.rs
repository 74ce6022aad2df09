//! # scrubsync MongoDB backend
//!
//! Implements the scrubsync storage traits on top of the blocking MongoDB
//! driver.
//!
//! This crate provides:
//! - [`MongoConfig`]: connection settings read from the environment
//! - [`MongoHandle`]: the process-wide connection, cloned into each component
//! - [`MongoRecords`]: source and sink collections, including change streams
//! - [`MongoCheckpoints`]: the `syncState` checkpoint slot
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scrubsync_mongo::{MongoConfig, MongoHandle};
//!
//! let config = MongoConfig::from_env()?;
//! let handle = MongoHandle::connect(&config)?;
//! let customers = handle.source();
//! let anonymized = handle.sink();
//! let checkpoints = handle.checkpoints();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoints;
mod client;
mod config;
mod error;
mod records;
mod wire;

pub use checkpoints::MongoCheckpoints;
pub use client::MongoHandle;
pub use config::{
    MongoConfig, CHECKPOINT_COLLECTION, DB_NAME_VAR, DB_URI_VAR, SINK_COLLECTION,
    SOURCE_COLLECTION,
};
pub use records::MongoRecords;
pub use wire::{AddressDoc, CustomerDoc};
