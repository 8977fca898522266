//! Notifications for stream transitions.
//!
//! A reconciliation pass returns [`Notification`] records; delivering them is
//! a separate step through a [`NotificationSink`]. [`NotificationBus`] is the
//! in-process sink with per-subscriber streams.

/// Subscription bus and sink trait.
pub mod bus;
/// Notification record types.
pub mod events;
/// Subscriber stream handle.
pub mod stream;

pub use bus::{NotificationBus, NotificationSink};
pub use events::{NewStreamOrigin, Notification, NotificationKind, SubscriptionId, UpdateReason};
pub use stream::NotificationStream;
