//! # scrubsync engine
//!
//! Keeps an anonymized mirror of a source collection consistent with it.
//!
//! This crate provides:
//! - Checkpoint store (best-effort durable progress marker)
//! - Batch writer (idempotent unordered bulk insert)
//! - Full sync and catch-up scanners
//! - Change feed subscriber (per-event apply and checkpoint)
//! - Sync orchestrator (startup state machine, tailing with reconnect)
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator ─┬─ ForcedReindex ─▶ Full Sync ─▶ stop
//!               ├─ NoCheckpoint  ─▶ Full Sync ─▶ Tail(epoch)
//!               └─ HasCheckpoint ─▶ Catch-Up(T - window) ─▶ Tail(T - window)
//! ```
//!
//! Scanners and the subscriber anonymize, write through the [`BatchWriter`]
//! and record progress in the [`CheckpointStore`].
//!
//! ## Key Invariants
//!
//! - Delivery is at-least-once; duplicate inserts are treated as success
//! - The stored checkpoint never decreases except when a full sync clears it
//! - Work is strictly serial: one record or event at a time, in cursor/feed order
//! - Source deletions and drops are observed but never applied to the sink

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod config;
mod error;
mod scanner;
mod state;
mod subscriber;
mod writer;

pub use checkpoint::{CheckpointStore, CheckpointWrite, CHECKPOINT_KEY};
pub use config::{RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use scanner::{ScanReport, Scanner};
pub use state::{StartupState, SyncOrchestrator, SyncOutcome, SyncPhase, SyncStats};
pub use subscriber::{ChangeSubscriber, EventOutcome, FeedReport};
pub use writer::{BatchWriter, WriteSummary};
