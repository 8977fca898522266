//! In-process notification fan-out.
//!
//! Delivery is synchronous and never blocks the reconciler: every subscriber
//! has a bounded buffer and a full buffer drops the notification (counted).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::warn;

use crate::config::LiveConfig;

use super::events::{Notification, SubscriptionId};
use super::stream::NotificationStream;

/// Receives notifications from the controller.
///
/// Implementations must not block for long: delivery happens on the thread
/// that ran the reconciliation pass.
pub trait NotificationSink: Send + Sync {
    /// Hands one notification to the sink. Failures are the sink's concern.
    fn deliver(&self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn deliver(&self, notification: &Notification) {
        self(notification);
    }
}

/// Notification bus: owns subscriptions and fans notifications out to them.
#[derive(Debug)]
pub struct NotificationBus {
    stream_capacity: usize,
    subscribers: Mutex<HashMap<SubscriptionId, Sender<Notification>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl NotificationBus {
    /// Creates a bus whose subscriber buffers hold `stream_capacity` items.
    #[must_use]
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            stream_capacity: stream_capacity.max(1),
            subscribers: Mutex::new(HashMap::new()),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates a bus sized by `config.notification_capacity`.
    #[must_use]
    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(config.notification_capacity)
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> NotificationStream {
        let subscription_id = SubscriptionId::new();
        let (tx, rx) = bounded::<Notification>(self.stream_capacity);

        match self.subscribers.lock() {
            Ok(mut subs) => {
                subs.insert(subscription_id, tx);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(subscription_id, tx);
            }
        }

        NotificationStream::new(subscription_id, rx)
    }

    /// Removes a subscription. Returns false if it was unknown.
    pub fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        match self.subscribers.lock() {
            Ok(mut subs) => subs.remove(&subscription_id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&subscription_id).is_some(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Notifications handed to at least one subscriber buffer.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Per-subscriber deliveries lost to full buffers.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default())
    }
}

impl NotificationSink for NotificationBus {
    fn deliver(&self, notification: &Notification) {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut accepted = false;
        subs.retain(|id, tx| match tx.try_send(notification.clone()) {
            Ok(()) => {
                accepted = true;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(subscription = %id, "subscriber buffer full, notification dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        if accepted {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}
