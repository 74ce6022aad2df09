//! # scrubsync testkit
//!
//! Test utilities for scrubsync.
//!
//! This crate provides:
//! - A mirror fixture wiring in-memory source, sink and checkpoint slot
//! - Record builders pinned to a creation timestamp
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use scrubsync_testkit::prelude::*;
//!
//! let mirror = TestMirror::new();
//! let records = mirror.seed_at(&[1_000, 2_000]);
//! assert_eq!(mirror.source.len(), records.len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
