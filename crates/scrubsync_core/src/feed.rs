//! In-process change feed for the memory backend.
//!
//! The feed fans committed mutations out to subscribers:
//! - Each subscriber has its own [`FeedFilter`], applied before delivery
//! - Delivery order is emit order
//! - Events emitted before a subscription are never delivered to it
//! - [`ChangeFeed::close`] and [`ChangeFeed::fail`] end every open stream
//!
//! # Usage
//!
//! ```rust
//! use scrubsync_core::{ChangeEvent, ChangeFeed, FeedFilter, Timestamp};
//!
//! let feed = ChangeFeed::new();
//! let stream = feed.subscribe(FeedFilter::since(Timestamp::EPOCH));
//!
//! feed.emit(ChangeEvent::CollectionDrop);
//! feed.close();
//!
//! let events: Vec<_> = stream.iter().collect();
//! assert_eq!(events.len(), 1);
//! ```

use crate::change::{ChangeEvent, FeedFilter};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

struct Subscriber {
    filter: FeedFilter,
    tx: Sender<StoreResult<ChangeEvent>>,
}

/// A change feed that distributes mutations to filtered subscribers.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the feed.
    ///
    /// The returned receiver yields every future event that passes `filter`
    /// and disconnects once the feed is closed or failed.
    pub fn subscribe(&self, filter: FeedFilter) -> Receiver<StoreResult<ChangeEvent>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(Subscriber { filter, tx });
        rx
    }

    /// Emits an event to every subscriber whose filter accepts it.
    ///
    /// Subscribers whose receiver has been dropped are removed.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sub| {
            if !sub.filter.matches(&event) {
                return true;
            }
            sub.tx.send(Ok(event.clone())).is_ok()
        });
    }

    /// Ends every open stream cleanly.
    pub fn close(&self) {
        self.subscribers.write().clear();
    }

    /// Delivers an error to every open stream, then ends them.
    pub fn fail(&self, message: &str) {
        let mut subscribers = self.subscribers.write();
        for sub in subscribers.drain(..) {
            let _ = sub.tx.send(Err(StoreError::Feed(message.to_owned())));
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
