//! Storage for the persisted live list.
//!
//! The [`ListStore`] trait is the storage seam; [`MemoryListStore`] is always
//! available and the file backend sits behind the `persistent` feature.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::MemoryListStore;
pub use traits::{ListStore, StorageError, LAST_STREAM_LIST_KEY};

#[cfg(feature = "persistent")]
pub use persistent::{open_store, FileListStore, LockOwner, PersistentConfig};
