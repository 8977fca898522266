//! # livewatch - live-stream list reconciliation
//!
//! Pollers periodically report which streams each service has live and which
//! channels they are watching. livewatch keeps one durable list of known live
//! streams in step with those reports, tracks each stream's lifecycle and
//! emits notifications when a stream appears, changes, comes back, times out
//! or goes offline.
//!
//! ## Core Concepts
//!
//! - **Entry**: one known live stream, keyed by `(service, id)` and belonging to a channel
//! - **Reconciliation pass**: applying one service's poll result to the list
//! - **Identity match**: an incoming entry whose id is already stored
//! - **Duplicate match**: a stream restarted under a new id, recognized by title and game
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use livewatch::{LiveConfig, LiveController, MemoryListStore, NotificationBus, PollResult, StreamEntry};
//!
//! let bus = Arc::new(NotificationBus::default());
//! let notifications = bus.subscribe();
//! let controller = LiveController::open(Arc::new(MemoryListStore::new()), bus, LiveConfig::default())?;
//!
//! let entry = StreamEntry::new("twitch", "v1", "somechannel", chrono::Utc::now())
//!     .with_channel("Speedrun", "Some Game");
//! controller.update(PollResult::new("twitch", vec![entry], ["somechannel"]))?;
//! assert_eq!(notifications.drain().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod debounce;
pub mod diff;
pub mod entry;
pub mod error;
pub mod index;
pub mod matcher;
pub mod notify;
pub mod reconcile;
pub mod runtime;
pub mod storage;

pub use config::LiveConfig;
pub use controller::LiveController;
pub use debounce::PersistenceDebouncer;
pub use diff::{merge, ChangeSet, Diff, Merge};
pub use entry::{ChannelInfo, LiveList, StreamEntry};
pub use error::{ExecutionError, LiveError, LiveResult, ValidationError};
pub use index::LiveIndex;
pub use matcher::find_duplicate;
pub use notify::{
    NewStreamOrigin, Notification, NotificationBus, NotificationKind, NotificationSink, NotificationStream,
    UpdateReason,
};
pub use reconcile::{PassReport, PollResult, ReconcilePolicy, Reconciler};
pub use runtime::{EventHandle, EventOutcome, LiveEvent, LiveRuntime};
pub use storage::{ListStore, MemoryListStore, StorageError};

#[cfg(feature = "persistent")]
pub use storage::{open_store, FileListStore, PersistentConfig};
