//! Best-effort durable sync progress.
//!
//! The checkpoint is the creation timestamp of the newest source record known
//! to be reflected in the sink. Failures are logged and reported through
//! [`CheckpointWrite`], never raised: a lost checkpoint write only widens the
//! replay on the next restart.

use scrubsync_core::{CheckpointSlot, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key of the singleton checkpoint slot.
pub const CHECKPOINT_KEY: &str = "lastTimestamp";

/// Outcome of a checkpoint write. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointWrite {
    /// The backend acknowledged the write.
    Persisted,
    /// The write failed and was logged.
    Failed(String),
}

impl CheckpointWrite {
    /// Returns true if the backend acknowledged the write.
    pub fn is_persisted(&self) -> bool {
        matches!(self, CheckpointWrite::Persisted)
    }
}

/// Reads and writes the sync checkpoint through a [`CheckpointSlot`].
pub struct CheckpointStore<C: CheckpointSlot> {
    slot: Arc<C>,
    key: String,
}

impl<C: CheckpointSlot> CheckpointStore<C> {
    /// Creates a store over `slot` using `key`.
    pub fn new(slot: Arc<C>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    /// Returns the underlying slot.
    pub fn slot(&self) -> &Arc<C> {
        &self.slot
    }

    /// Records `timestamp` as processed.
    ///
    /// The slot keeps the larger of the stored and the given value, so saving
    /// an older timestamp leaves the checkpoint where it is.
    pub fn save(&self, timestamp: Timestamp) -> CheckpointWrite {
        match self.slot.raise(&self.key, timestamp) {
            Ok(()) => {
                debug!(%timestamp, "checkpoint saved");
                CheckpointWrite::Persisted
            }
            Err(e) => {
                warn!(%timestamp, error = %e, "failed to save checkpoint");
                CheckpointWrite::Failed(e.to_string())
            }
        }
    }

    /// Loads the checkpoint.
    ///
    /// Read failures are logged and reported as absent.
    pub fn load(&self) -> Option<Timestamp> {
        match self.slot.get(&self.key) {
            Ok(value) => {
                match value {
                    Some(timestamp) => info!(%timestamp, "loaded checkpoint"),
                    None => info!("no checkpoint stored"),
                }
                value
            }
            Err(e) => {
                warn!(error = %e, "failed to load checkpoint");
                None
            }
        }
    }

    /// Deletes the checkpoint.
    pub fn clear(&self) -> CheckpointWrite {
        match self.slot.remove(&self.key) {
            Ok(()) => {
                info!("checkpoint cleared");
                CheckpointWrite::Persisted
            }
            Err(e) => {
                warn!(error = %e, "failed to clear checkpoint");
                CheckpointWrite::Failed(e.to_string())
            }
        }
    }
}
