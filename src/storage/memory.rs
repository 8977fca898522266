//! In-memory storage backend.
//!
//! Thread-safe implementation of [`ListStore`] for embedded usage and tests.
//! Saved lists are kept as serialized JSON so a load goes through the same
//! serde path as the file backend.

use std::sync::RwLock;

use crate::entry::StreamEntry;
use crate::storage::traits::{ListStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// In-memory list slot.
#[derive(Debug, Default)]
pub struct MemoryListStore {
    slot: RwLock<Option<Vec<u8>>>,
    saves: RwLock<u64>,
}

impl MemoryListStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a list, as if it had been saved earlier.
    pub fn with_entries(entries: &[StreamEntry]) -> Result<Self, StorageError> {
        let store = Self::new();
        store.save(entries)?;
        *store.saves.write().map_err(|_| lock_err("saves"))? = 0;
        Ok(store)
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> Result<u64, StorageError> {
        Ok(*self.saves.read().map_err(|_| lock_err("saves"))?)
    }
}

impl ListStore for MemoryListStore {
    fn load(&self) -> Result<Option<Vec<StreamEntry>>, StorageError> {
        let slot = self.slot.read().map_err(|_| lock_err("slot"))?;
        slot.as_deref()
            .map(|bytes| {
                serde_json::from_slice(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    fn save(&self, entries: &[StreamEntry]) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(entries).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        *self.slot.write().map_err(|_| lock_err("slot"))? = Some(bytes);
        *self.saves.write().map_err(|_| lock_err("saves"))? += 1;
        Ok(())
    }
}
