//! Abstract storage trait for the persisted live list.
//!
//! The list lives in a single slot: it is read once at startup to seed the
//! reconciler and overwritten as a whole on every debounced save.

use thiserror::Error;

use crate::entry::StreamEntry;

/// Name of the slot the live list is persisted under.
pub const LAST_STREAM_LIST_KEY: &str = "lastStreamList";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O failure while reading or writing the slot.
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Stored data failed integrity checks.
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Another process holds the store.
    #[error("Store is locked: {0}")]
    Locked(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Locked(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock => Self::Locked(err.to_string()),
            std::io::ErrorKind::InvalidData => Self::Corrupted(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Storage trait for the live list slot.
///
/// # Safety Considerations
/// - `save` must replace the slot atomically: a reader sees either the old
///   or the new list, never a mix
/// - Implementations should handle concurrent access safely
pub trait ListStore: Send + Sync {
    /// Read the persisted list. `Ok(None)` means nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<StreamEntry>>, StorageError>;

    /// Overwrite the persisted list.
    fn save(&self, entries: &[StreamEntry]) -> Result<(), StorageError>;
}
