//! File-backed list slot.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entry::StreamEntry;
use crate::storage::traits::{ListStore, StorageError, LAST_STREAM_LIST_KEY};

use super::codec;
use super::file_lock::{DirLock, LockOwner};
use super::PersistentConfig;

const SNAPSHOT_EXTENSION: &str = "lvwl";
const TEMP_MARKER: &str = ".tmp.";

/// Stores the live list as a checksummed snapshot inside a locked directory.
///
/// Every save writes a fresh temp file, fsyncs it (when configured) and
/// renames it over the previous snapshot, so a crash mid-write leaves the
/// last complete list in place.
#[derive(Debug)]
pub struct FileListStore {
    dir: PathBuf,
    path: PathBuf,
    config: PersistentConfig,
    write_guard: Mutex<()>,
    lock: DirLock,
}

impl FileListStore {
    /// Opens (creating if needed) the store directory and takes its lock.
    pub fn open(dir: &Path, config: PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let lock = DirLock::acquire(dir)?;

        let path = dir.join(format!("{LAST_STREAM_LIST_KEY}.{SNAPSHOT_EXTENSION}"));
        let store = Self {
            dir: dir.to_path_buf(),
            path,
            config,
            write_guard: Mutex::new(()),
            lock,
        };
        store.remove_stale_temp_files()?;

        info!(path = %store.path.display(), "opened live list store");
        Ok(store)
    }

    /// The owner record this store wrote into its directory lock.
    #[must_use]
    pub const fn lock_owner(&self) -> &LockOwner {
        self.lock.owner()
    }

    /// Path of the current snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.path
    }

    fn remove_stale_temp_files(&self) -> Result<(), StorageError> {
        let prefix = format!("{LAST_STREAM_LIST_KEY}.{SNAPSHOT_EXTENSION}{TEMP_MARKER}");
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                debug!(file = %name.to_string_lossy(), "removing leftover snapshot temp file");
                fs::remove_file(dir_entry.path())?;
            }
        }
        Ok(())
    }

    fn write_temp(&self, temp_path: &Path, entries: &[StreamEntry]) -> Result<(), StorageError> {
        let bytes = codec::encode(entries)?;
        if bytes.len() as u64 > self.config.max_snapshot_size {
            return Err(StorageError::SerializationError(format!(
                "snapshot of {} bytes exceeds max_snapshot_size {}",
                bytes.len(),
                self.config.max_snapshot_size
            )));
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        let mut writer = BufWriter::new(file);
        codec::write_header(&mut writer)?;
        writer.write_all(&bytes)?;
        writer.flush()?;

        if self.config.sync_on_write {
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl ListStore for FileListStore {
    fn load(&self) -> Result<Option<Vec<StreamEntry>>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader)?;
        let max_len = usize::try_from(self.config.max_snapshot_size).unwrap_or(usize::MAX);
        let entries: Vec<StreamEntry> = codec::decode(&mut reader, max_len)?;

        debug!(entries = entries.len(), "loaded live list snapshot");
        Ok(Some(entries))
    }

    fn save(&self, entries: &[StreamEntry]) -> Result<(), StorageError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| StorageError::BackendError("poisoned lock: write_guard".to_string()))?;

        let temp_path = self
            .path
            .with_extension(format!("{SNAPSHOT_EXTENSION}{TEMP_MARKER}{}", Uuid::new_v4()));

        if let Err(err) = self.write_temp(&temp_path, entries) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(error = %cleanup, path = %temp_path.display(), "failed to remove snapshot temp file");
            }
            return Err(err);
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
