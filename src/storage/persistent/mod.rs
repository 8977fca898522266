//! Persistent storage backend for the live list.
//!
//! This module provides a durable, crash-safe list slot with:
//! - An exclusive directory lock that records its owner's pid
//! - CRC32 checksums for corruption detection
//! - Write-to-temp-then-rename snapshots
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                FileListStore                 │
//! ├──────────────────────────────────────────────┤
//! │  save: encode → temp file → fsync → rename   │
//! │  load: header → framed JSON → CRC check      │
//! │                      ↓                       │
//! │           ┌─────────────────────┐            │
//! │           │ DirLock (pid record)│            │
//! │           └─────────────────────┘            │
//! └──────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod store;

pub use file_lock::{DirLock, LockOwner};
pub use store::FileListStore;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LiveResult, ValidationError};

/// Configuration for the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether to fsync each snapshot before renaming it into place.
    pub sync_on_write: bool,
    /// Maximum snapshot size (bytes), checked on both save and load.
    pub max_snapshot_size: u64,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_snapshot_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl PersistentConfig {
    const MIN_SNAPSHOT_SIZE: u64 = 4 * 1024; // 4 KiB

    /// Checks the configuration, returning it unchanged when valid.
    pub fn validate(self) -> LiveResult<Self> {
        if self.max_snapshot_size < Self::MIN_SNAPSHOT_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "max_snapshot_size must be at least {} bytes (got {})",
                    Self::MIN_SNAPSHOT_SIZE,
                    self.max_snapshot_size
                ),
            }
            .into());
        }

        Ok(self)
    }
}

/// Open or create a file-backed list store in the given directory.
///
/// # Errors
/// - If the configuration is invalid
/// - If the directory cannot be created or accessed
/// - If another process holds the lock
///
/// # Example
/// ```rust,ignore
/// use livewatch::storage::open_store;
///
/// let store = open_store("./state", None)?;
/// let controller = LiveController::open(Arc::new(store), sink, LiveConfig::default())?;
/// ```
pub fn open_store(path: impl AsRef<Path>, config: Option<PersistentConfig>) -> LiveResult<FileListStore> {
    let cfg = config.unwrap_or_default().validate()?;
    Ok(FileListStore::open(path.as_ref(), cfg)?)
}
