//! Driver error classification.

use mongodb::error::{Error, ErrorKind};
use scrubsync_core::StoreError;

/// Maps a driver error, using `other` for failures reported by the server.
pub(crate) fn store_error(err: Error, other: fn(String) -> StoreError) -> StoreError {
    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => StoreError::Connection(message),
        ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
            StoreError::Serialization(message)
        }
        ErrorKind::InvalidArgument { .. } => StoreError::Configuration(message),
        _ => other(message),
    }
}
