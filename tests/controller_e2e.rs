//! Controller wiring: delivery, debounced persistence and the event runtime.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use livewatch::{
    ListStore, LiveConfig, LiveController, LiveEvent, LiveRuntime, MemoryListStore, NotificationBus,
    NotificationKind, PollResult, StreamEntry,
};

fn entry(id: &str, channel: &str) -> StreamEntry {
    StreamEntry::new("twitch", id, channel, Utc::now()).with_channel(id, "Game")
}

fn config(debounce_ms: u64) -> LiveConfig {
    LiveConfig {
        save_debounce_ms: debounce_ms,
        ..LiveConfig::default()
    }
}

#[test]
fn test_requests_in_one_window_write_once() {
    let store = Arc::new(MemoryListStore::new());
    let controller = LiveController::open(store.clone(), Arc::new(NotificationBus::default()), config(50)).unwrap();

    for i in 0..5 {
        let id = format!("s{i}");
        let channel = format!("c{i}");
        let poll = PollResult::new("twitch", vec![entry(&id, &channel)], [channel.as_str()]);
        controller.update(poll).unwrap();
    }
    assert_eq!(store.save_count().unwrap(), 0);

    thread::sleep(Duration::from_millis(400));

    assert_eq!(store.save_count().unwrap(), 1);
    // The single write reflects the list at write time.
    assert_eq!(store.load().unwrap().unwrap().len(), 5);
    assert_eq!(controller.save_stats(), (1, 0));
}

#[test]
fn test_subscribers_receive_pass_notifications() {
    let config = config(250);
    let bus = Arc::new(NotificationBus::from_config(&config));
    let stream = bus.subscribe();
    let controller = LiveController::open(Arc::new(MemoryListStore::new()), bus.clone(), config).unwrap();

    controller
        .update(PollResult::new("twitch", vec![entry("s1", "c1")], ["c1"]))
        .unwrap();
    controller.update(PollResult::new("twitch", vec![], ["c1"])).unwrap();

    let received = stream.drain();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].kind(), NotificationKind::NewStream);
    assert_eq!(received[1].kind(), NotificationKind::Update);
    assert!(received[1].entry().is_offline);
    assert_eq!(bus.dropped(), 0);
}

#[test]
fn test_small_notification_capacity_drops_overflow() {
    let config = LiveConfig {
        notification_capacity: 1,
        ..config(250)
    };
    let bus = Arc::new(NotificationBus::from_config(&config));
    let stream = bus.subscribe();
    let controller = LiveController::open(Arc::new(MemoryListStore::new()), bus.clone(), config).unwrap();

    let report = controller
        .update(PollResult::new("twitch", vec![entry("s1", "c1"), entry("s2", "c2")], ["c1", "c2"]))
        .unwrap();

    assert_eq!(report.notifications.len(), 2);
    assert_eq!(stream.drain().len(), 1);
    assert_eq!(bus.dropped(), 1);
}

#[test]
fn test_list_survives_controller_restart() {
    let store = Arc::new(MemoryListStore::new());
    {
        let controller =
            LiveController::open(store.clone(), Arc::new(NotificationBus::default()), config(10_000)).unwrap();
        controller
            .update(PollResult::new("twitch", vec![entry("s1", "c1")], ["c1"]))
            .unwrap();
        // Dropped with a pending save: the save still lands.
    }

    let bus = Arc::new(NotificationBus::default());
    let stream = bus.subscribe();
    let controller = LiveController::open(store, bus, config(250)).unwrap();
    assert_eq!(controller.snapshot().unwrap().len(), 1);

    // Already known, so no new-stream on the next poll.
    controller
        .update(PollResult::new("twitch", vec![entry("s1", "c1")], ["c1"]))
        .unwrap();
    assert!(stream.drain().is_empty());
}

#[test]
fn test_runtime_applies_events_from_many_threads() {
    let store = Arc::new(MemoryListStore::new());
    let controller = Arc::new(
        LiveController::open(store.clone(), Arc::new(NotificationBus::default()), config(20)).unwrap(),
    );
    let runtime = Arc::new(LiveRuntime::start(controller).unwrap());

    let pollers: Vec<_> = ["twitch", "youtube", "goodgame"]
        .into_iter()
        .map(|service| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                for i in 0..10 {
                    let channel = format!("{service}-c{i}");
                    let entry = StreamEntry::new(service, format!("{service}-s{i}"), channel.clone(), Utc::now());
                    runtime.update(PollResult::new(service, vec![entry], [channel])).unwrap();
                }
            })
        })
        .collect();
    for poller in pollers {
        poller.join().unwrap();
    }

    runtime.try_submit(LiveEvent::SaveStreamList).unwrap();
    let runtime = Arc::try_unwrap(runtime).unwrap();
    runtime.shutdown().unwrap();

    // Each service polled only its latest channel last; earlier channels of
    // the same service were no longer polled but are well inside the grace.
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.len(), 30);
}
