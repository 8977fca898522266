//! Exclusive ownership of a store directory.
//!
//! Only one process may own a live list directory: two reconcilers saving
//! over each other would silently drop transitions. The lock file doubles as
//! an owner record. The holder writes its pid and acquisition time into it,
//! and a process that finds the directory taken reports them in
//! [`StorageError::Locked`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::traits::StorageError;

const LOCK_FILE_NAME: &str = ".livewatch.lock";

/// Who holds a store directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    /// Process id of the holder.
    pub pid: u32,
    /// When the holder took the lock.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub since: DateTime<Utc>,
}

/// Exclusive directory lock, held for the lifetime of the value.
///
/// Dropping the lock clears the owner record before the OS lock is released.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
    owner: LockOwner,
}

impl DirLock {
    /// Takes the lock on `dir` without waiting and records this process as owner.
    ///
    /// # Errors
    /// `StorageError::Locked` naming the current holder when the directory is
    /// taken, `StorageError::Io` when the lock file cannot be opened or written.
    pub fn acquire(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !platform::try_lock_exclusive(&file)? {
            return Err(StorageError::Locked(describe_holder(dir, &path)));
        }

        let owner = LockOwner {
            pid: std::process::id(),
            since: Utc::now(),
        };
        write_owner(&mut file, Some(&owner))?;
        debug!(path = %path.display(), pid = owner.pid, "store directory locked");

        Ok(Self { file, path, owner })
    }

    /// Reads the owner record of `dir` without taking the lock.
    ///
    /// `None` when the directory is free, was never locked, or the record is
    /// unreadable (on Windows the holder's byte-range lock blocks reads).
    #[must_use]
    pub fn read_owner(dir: &Path) -> Option<LockOwner> {
        let raw = fs::read_to_string(dir.join(LOCK_FILE_NAME)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// This process's owner record.
    #[must_use]
    pub const fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        // A stale record would name a process that no longer owns anything.
        let _ = write_owner(&mut self.file, None);
    }
}

fn write_owner(file: &mut File, owner: Option<&LockOwner>) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    if let Some(owner) = owner {
        serde_json::to_writer(&mut *file, owner)?;
    }
    file.sync_data()
}

fn describe_holder(dir: &Path, lock_path: &Path) -> String {
    match lock_path.parent().and_then(DirLock::read_owner) {
        Some(owner) => format!(
            "{} is held by pid {} since {}",
            dir.display(),
            owner.pid,
            owner.since.to_rfc3339()
        ),
        None => format!("{} is held by another process", dir.display()),
    }
}

#[cfg(unix)]
mod platform {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    /// `Ok(false)` when another open file description holds the lock.
    pub(super) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;

    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};
    use windows_sys::Win32::System::IO::OVERLAPPED;

    /// `Ok(false)` when another handle holds the lock.
    pub(super) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: `handle` belongs to `file`; OVERLAPPED is plain data and may be zeroed.
        let locked = unsafe {
            let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if locked != 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::fs::File;
    use std::io;

    pub(super) fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "directory locking is not supported on this platform",
        ))
    }
}
