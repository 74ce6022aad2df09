//! Change events delivered by a source's live feed.

use crate::record::{Record, RecordId, Timestamp};
use std::fmt;

/// Kind of mutation reported by a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// A record was inserted.
    Insert,
    /// A record was updated or replaced.
    Update,
    /// A record was deleted.
    Delete,
    /// The whole collection was dropped.
    CollectionDrop,
    /// The whole database was dropped.
    DatabaseDrop,
}

impl OperationKind {
    /// Every kind the sync engine subscribes to.
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Insert,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::CollectionDrop,
        OperationKind::DatabaseDrop,
    ];

    /// Returns the server-side name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::CollectionDrop => "drop",
            OperationKind::DatabaseDrop => "dropDatabase",
        }
    }

    /// Returns true if events of this kind carry a post-change record.
    pub fn carries_record(&self) -> bool {
        matches!(self, OperationKind::Insert | OperationKind::Update)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mutation observed on the source collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A record was inserted; carries the new record.
    Insert(Record),
    /// A record was updated; carries the post-change record.
    Update(Record),
    /// A record was deleted.
    Delete {
        /// Identity of the deleted record, when the feed reports it.
        id: Option<RecordId>,
    },
    /// The collection was dropped.
    CollectionDrop,
    /// The database was dropped.
    DatabaseDrop,
}

impl ChangeEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> OperationKind {
        match self {
            ChangeEvent::Insert(_) => OperationKind::Insert,
            ChangeEvent::Update(_) => OperationKind::Update,
            ChangeEvent::Delete { .. } => OperationKind::Delete,
            ChangeEvent::CollectionDrop => OperationKind::CollectionDrop,
            ChangeEvent::DatabaseDrop => OperationKind::DatabaseDrop,
        }
    }

    /// Returns the post-change record for inserts and updates.
    pub fn record(&self) -> Option<&Record> {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => Some(record),
            _ => None,
        }
    }
}

/// Server-side predicate applied to a change feed subscription.
///
/// An event passes when its kind is in `kinds` and, if it carries a record,
/// that record was created at or after `since`. Events without a record
/// are not subject to the time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    /// Operation kinds to deliver.
    pub kinds: Vec<OperationKind>,
    /// Lower bound on record creation time.
    pub since: Timestamp,
}

impl FeedFilter {
    /// Subscribes to every kind of event from `since` onwards.
    pub fn since(since: Timestamp) -> Self {
        Self {
            kinds: OperationKind::ALL.to_vec(),
            since,
        }
    }

    /// Returns true if the event passes the filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.kinds.contains(&event.kind()) {
            return false;
        }
        event
            .record()
            .map_or(true, |record| record.created_at >= self.since)
    }
}
