//! Debounced persistence of the live list.
//!
//! Save requests coalesce: the list is written once no new request has
//! arrived for the debounce window, and the snapshot is taken when the write
//! runs, not when it was requested. A dedicated thread owns the timer so
//! callers never block on storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::entry::StreamEntry;
use crate::error::{ExecutionError, LiveError, LiveResult};
use crate::storage::ListStore;

/// Produces the list to persist at the moment a write runs.
pub type SnapshotSource = Arc<dyn Fn() -> LiveResult<Vec<StreamEntry>> + Send + Sync>;

const REQUEST_QUEUE: usize = 64;
const WORKER_PATH: &str = "persistence";

enum SaveMsg {
    Request,
    Flush(Sender<LiveResult<()>>),
}

#[derive(Debug, Default)]
struct SaveStats {
    writes: AtomicU64,
    failures: AtomicU64,
}

struct SaveWriter {
    store: Arc<dyn ListStore>,
    source: SnapshotSource,
    stats: Arc<SaveStats>,
}

impl SaveWriter {
    fn write(&self) -> LiveResult<()> {
        let result = (self.source)().and_then(|entries| {
            self.store.save(&entries)?;
            Ok(entries.len())
        });

        match result {
            Ok(len) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                debug!(entries = len, "stream list saved");
                Ok(())
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "failed to save stream list");
                Err(err)
            }
        }
    }

    fn run(self, rx: &Receiver<SaveMsg>, window: Duration) {
        let mut deadline: Option<Instant> = None;
        loop {
            let msg = match deadline {
                Some(at) => rx.recv_deadline(at),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match msg {
                Ok(SaveMsg::Request) => deadline = Some(Instant::now() + window),
                Ok(SaveMsg::Flush(reply)) => {
                    deadline = None;
                    let _ = reply.send(self.write());
                }
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    let _ = self.write();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if deadline.is_some() {
                        let _ = self.write();
                    }
                    break;
                }
            }
        }
    }
}

/// Trailing-edge save scheduler backed by a worker thread.
///
/// Dropping the debouncer performs any pending write before the worker
/// exits.
pub struct PersistenceDebouncer {
    tx: Option<Sender<SaveMsg>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<SaveStats>,
    window: Duration,
}

impl PersistenceDebouncer {
    /// Starts the worker.
    ///
    /// # Errors
    /// Returns `ExecutionError::Spawn` if the thread cannot be created.
    pub fn start(store: Arc<dyn ListStore>, source: SnapshotSource, window: Duration) -> LiveResult<Self> {
        let stats = Arc::new(SaveStats::default());
        let writer = SaveWriter {
            store,
            source,
            stats: Arc::clone(&stats),
        };
        let (tx, rx) = bounded::<SaveMsg>(REQUEST_QUEUE);

        let worker = thread::Builder::new()
            .name("livewatch-save".to_string())
            .spawn(move || writer.run(&rx, window))
            .map_err(|e| ExecutionError::Spawn {
                name: "livewatch-save".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            stats,
            window,
        })
    }

    /// Schedules a write `window` after the latest request. Never blocks.
    pub fn request_save(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(SaveMsg::Request) {
            // A full queue already holds requests that will reset the timer.
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => warn!("save worker gone, request ignored"),
        }
    }

    /// Writes the current list now and waits for the outcome.
    ///
    /// A pending debounced write is subsumed by this one.
    pub fn flush(&self) -> LiveResult<()> {
        let tx = self.tx.as_ref().ok_or_else(disconnected)?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send(SaveMsg::Flush(reply_tx)).map_err(|_| disconnected())?;
        reply_rx.recv().map_err(|_| disconnected())?
    }

    /// Successful writes so far.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.stats.writes.load(Ordering::Relaxed)
    }

    /// Failed writes so far.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Quiet interval before a write.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for PersistenceDebouncer {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for PersistenceDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceDebouncer")
            .field("window", &self.window)
            .field("writes", &self.writes())
            .field("failures", &self.failures())
            .finish_non_exhaustive()
    }
}

fn disconnected() -> LiveError {
    LiveError::Execution(ExecutionError::Disconnected {
        path: WORKER_PATH.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use crate::storage::{MemoryListStore, StorageError};

    struct FailingStore;

    impl ListStore for FailingStore {
        fn load(&self) -> Result<Option<Vec<StreamEntry>>, StorageError> {
            Ok(None)
        }

        fn save(&self, _entries: &[StreamEntry]) -> Result<(), StorageError> {
            Err(StorageError::BackendError("disk on fire".to_string()))
        }
    }

    fn entry(id: &str) -> StreamEntry {
        StreamEntry::new("twitch", id, "c1", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    fn shared_list(entries: Vec<StreamEntry>) -> (Arc<Mutex<Vec<StreamEntry>>>, SnapshotSource) {
        let list = Arc::new(Mutex::new(entries));
        let reader = Arc::clone(&list);
        let source: SnapshotSource = Arc::new(move || Ok(reader.lock().unwrap().clone()));
        (list, source)
    }

    #[test]
    fn test_requests_coalesce_into_one_write() {
        let store = Arc::new(MemoryListStore::new());
        let (_list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(store.clone(), source, Duration::from_millis(40)).unwrap();

        for _ in 0..10 {
            debouncer.request_save();
        }
        assert_eq!(store.save_count().unwrap(), 0);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(store.save_count().unwrap(), 1);
        assert_eq!(debouncer.writes(), 1);
    }

    #[test]
    fn test_write_snapshots_latest_state() {
        let store = Arc::new(MemoryListStore::new());
        let (list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(store.clone(), source, Duration::from_millis(40)).unwrap();

        debouncer.request_save();
        list.lock().unwrap().push(entry("s2"));
        thread::sleep(Duration::from_millis(300));

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[test]
    fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryListStore::new());
        let (_list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(store.clone(), source, Duration::from_secs(60)).unwrap();

        debouncer.request_save();
        debouncer.flush().unwrap();

        assert_eq!(store.save_count().unwrap(), 1);
        assert_eq!(store.load().unwrap().unwrap()[0].id, "s1");
    }

    #[test]
    fn test_drop_writes_pending_save() {
        let store = Arc::new(MemoryListStore::new());
        let (_list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(store.clone(), source, Duration::from_secs(60)).unwrap();

        debouncer.request_save();
        drop(debouncer);

        assert_eq!(store.save_count().unwrap(), 1);
    }

    #[test]
    fn test_drop_without_request_does_not_write() {
        let store = Arc::new(MemoryListStore::new());
        let (_list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(store.clone(), source, Duration::from_millis(10)).unwrap();

        drop(debouncer);
        assert_eq!(store.save_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_write_is_counted_and_reported() {
        let (_list, source) = shared_list(vec![entry("s1")]);
        let debouncer = PersistenceDebouncer::start(Arc::new(FailingStore), source, Duration::from_millis(10)).unwrap();

        let err = debouncer.flush().unwrap_err();
        assert!(err.is_storage());
        assert_eq!(debouncer.failures(), 1);
        assert_eq!(debouncer.writes(), 0);
    }
}
