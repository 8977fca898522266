//! Restart and crash behaviour of the file-backed list store.
//!
//! These tests verify that:
//! - A controller reopened on the same directory resumes the saved list
//! - A torn temp file from a crash mid-save never replaces the last snapshot
//! - A corrupted snapshot is reported instead of silently loading as empty

#![cfg(feature = "persistent")]

use std::fs;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use livewatch::storage::open_store;
use livewatch::{ListStore, LiveConfig, LiveController, NotificationBus, PollResult, StreamEntry};

fn entry(id: &str, channel: &str) -> StreamEntry {
    StreamEntry::new("goodgame", id, channel, Utc.timestamp_opt(1_700_000_000, 0).unwrap()).with_channel(id, "Game")
}

#[test]
fn test_controller_resumes_saved_list() {
    let dir = tempdir().unwrap();

    {
        let store = Arc::new(open_store(dir.path(), None).unwrap());
        let controller = LiveController::open(store, Arc::new(NotificationBus::default()), LiveConfig::default()).unwrap();
        controller
            .update(PollResult::new("goodgame", vec![entry("s1", "c1"), entry("s2", "c2")], ["c1", "c2"]))
            .unwrap();
        controller.flush().unwrap();
    }

    let store = Arc::new(open_store(dir.path(), None).unwrap());
    let bus = Arc::new(NotificationBus::default());
    let stream = bus.subscribe();
    let controller = LiveController::open(store, bus, LiveConfig::default()).unwrap();

    let ids: Vec<String> = controller.snapshot().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);

    controller
        .update(PollResult::new("goodgame", vec![entry("s1", "c1"), entry("s2", "c2")], ["c1", "c2"]))
        .unwrap();
    assert!(stream.drain().is_empty());
}

#[test]
fn test_torn_temp_file_does_not_replace_snapshot() {
    let dir = tempdir().unwrap();

    {
        let store = open_store(dir.path(), None).unwrap();
        store.save(&[entry("s1", "c1")]).unwrap();
    }

    // Simulate a crash between writing the temp file and renaming it.
    let torn = dir.path().join("lastStreamList.lvwl.tmp.0123");
    fs::write(&torn, b"LVWL\x01garbage").unwrap();

    let store = open_store(dir.path(), None).unwrap();
    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "s1");
    assert!(!torn.exists());
}

#[test]
fn test_corrupted_snapshot_fails_open() {
    let dir = tempdir().unwrap();
    let snapshot = {
        let store = open_store(dir.path(), None).unwrap();
        store.save(&[entry("s1", "c1")]).unwrap();
        store.snapshot_path().to_path_buf()
    };

    let mut bytes = fs::read(&snapshot).unwrap();
    let last = bytes.len() - 2;
    bytes[last] ^= 0xFF;
    fs::write(&snapshot, bytes).unwrap();

    let store = Arc::new(open_store(dir.path(), None).unwrap());
    let err = LiveController::open(store, Arc::new(NotificationBus::default()), LiveConfig::default()).unwrap_err();
    assert!(err.is_storage());
}
