//! The live controller: owns the list and wires reconciliation to delivery
//! and persistence.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::LiveConfig;
use crate::debounce::{PersistenceDebouncer, SnapshotSource};
use crate::entry::{LiveList, StreamEntry};
use crate::error::{LiveError, LiveResult};
use crate::notify::NotificationSink;
use crate::reconcile::{PassReport, PollResult, ReconcilePolicy, Reconciler};
use crate::storage::ListStore;

/// Serializing access point for the live list.
///
/// Passes for any service run one at a time under an internal lock.
/// Notifications are delivered after the lock is released, then a debounced
/// save is requested.
pub struct LiveController {
    reconciler: Arc<Mutex<Reconciler>>,
    sink: Arc<dyn NotificationSink>,
    debouncer: PersistenceDebouncer,
    config: LiveConfig,
}

impl LiveController {
    /// Loads the last saved list from `store` and starts the save worker.
    ///
    /// # Errors
    /// Fails on invalid configuration, on a store that cannot be read, or if
    /// the save worker cannot be spawned.
    pub fn open(store: Arc<dyn ListStore>, sink: Arc<dyn NotificationSink>, config: LiveConfig) -> LiveResult<Self> {
        let config = config.validate()?;

        let list = store.load()?.map(LiveList::from_entries).unwrap_or_default();
        info!(entries = list.len(), "live list loaded");

        let reconciler = Arc::new(Mutex::new(Reconciler::new(list, ReconcilePolicy::from(&config))));
        let source_ref = Arc::clone(&reconciler);
        let source: SnapshotSource = Arc::new(move || Ok(lock(&source_ref)?.list().as_slice().to_vec()));
        let debouncer = PersistenceDebouncer::start(store, source, config.save_debounce())?;

        Ok(Self {
            reconciler,
            sink,
            debouncer,
            config,
        })
    }

    /// Applies a poll result at the current time.
    pub fn update(&self, poll: PollResult) -> LiveResult<PassReport> {
        self.update_at(poll, Utc::now())
    }

    /// Applies a poll result as of `now`.
    ///
    /// # Errors
    /// A malformed poll is rejected without touching the list, delivering
    /// anything or scheduling a save.
    pub fn update_at(&self, poll: PollResult, now: DateTime<Utc>) -> LiveResult<PassReport> {
        let report = lock(&self.reconciler)?.reconcile(poll, now)?;

        for notification in &report.notifications {
            self.sink.deliver(notification);
        }
        self.debouncer.request_save();

        Ok(report)
    }

    /// Schedules a debounced save without reconciling.
    pub fn request_save(&self) {
        self.debouncer.request_save();
    }

    /// Saves immediately and waits for the outcome.
    pub fn flush(&self) -> LiveResult<()> {
        self.debouncer.flush()
    }

    /// A copy of the current list.
    pub fn snapshot(&self) -> LiveResult<Vec<StreamEntry>> {
        Ok(lock(&self.reconciler)?.list().as_slice().to_vec())
    }

    /// Changes the offline timeout for subsequent passes.
    pub fn set_offline_timeout(&self, timeout: chrono::Duration) -> LiveResult<()> {
        let mut reconciler = lock(&self.reconciler)?;
        let policy = ReconcilePolicy {
            offline_timeout: timeout,
            ..reconciler.policy()
        };
        reconciler.set_policy(policy);
        Ok(())
    }

    /// Configuration the controller was opened with.
    #[must_use]
    pub const fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Successful and failed persistence writes so far.
    #[must_use]
    pub fn save_stats(&self) -> (u64, u64) {
        (self.debouncer.writes(), self.debouncer.failures())
    }
}

impl std::fmt::Debug for LiveController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveController")
            .field("config", &self.config)
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

fn lock(reconciler: &Mutex<Reconciler>) -> LiveResult<MutexGuard<'_, Reconciler>> {
    reconciler
        .lock()
        .map_err(|_| LiveError::internal("live list lock poisoned"))
}
