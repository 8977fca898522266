use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{ExecutionError, LiveError, LiveResult};

use super::events::{Notification, SubscriptionId};

/// A subscriber's view of the notification bus.
///
/// Dropping the stream disconnects it; the bus forgets the subscription on
/// its next delivery.
#[derive(Debug)]
pub struct NotificationStream {
    subscription_id: SubscriptionId,
    rx: Receiver<Notification>,
}

impl NotificationStream {
    pub(crate) fn new(subscription_id: SubscriptionId, rx: Receiver<Notification>) -> Self {
        Self { subscription_id, rx }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Receive the next notification (blocking).
    pub fn recv(&self) -> LiveResult<Notification> {
        self.rx.recv().map_err(|_| disconnected())
    }

    /// Receive the next notification with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> LiveResult<Notification> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => LiveError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Receive a notification if one is already queued.
    pub fn try_recv(&self) -> LiveResult<Option<Notification>> {
        match self.rx.try_recv() {
            Ok(notification) => Ok(Some(notification)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(disconnected()),
        }
    }

    /// Takes every queued notification without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }
}

fn disconnected() -> LiveError {
    LiveError::Execution(ExecutionError::Disconnected {
        path: "notification_stream".to_string(),
    })
}
