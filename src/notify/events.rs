//! Notification records produced by a reconciliation pass.
//!
//! These types are serializable so they can be written out by the replay
//! tool or forwarded to an external bus as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::StreamEntry;

/// Unique identifier for a bus subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a stream was reported as new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewStreamOrigin {
    /// First stream seen on a channel with no known entries.
    NewChannel,
    /// Another simultaneous stream on a channel that already has entries.
    ExtraStream,
}

/// Why an existing entry was reported as updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateReason {
    /// Identity match cleared the offline or timeout flag.
    Online,
    /// Identity match changed the status or game.
    ContentChanged,
    /// Duplicate match cleared the offline or timeout flag.
    Recovered,
    /// The source reported the channel as timed out.
    TimedOut,
    /// No longer reported while the channel is still polled.
    WentOffline,
}

/// Kind of notification, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// [`Notification::NewStream`].
    NewStream,
    /// [`Notification::Update`].
    Update,
}

/// A transition emitted by a reconciliation pass.
///
/// `entry` is a snapshot of the entry as stored in the live list right
/// after the transition (for updates, the merged entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Emitted exactly once, on the pass that first records the entry.
    NewStream {
        /// Why the entry counts as new.
        origin: NewStreamOrigin,
        /// The recorded entry.
        entry: StreamEntry,
    },

    /// Emitted when an existing entry's flags or displayed content change.
    Update {
        /// What changed.
        reason: UpdateReason,
        /// The merged entry.
        entry: StreamEntry,
    },
}

impl Notification {
    /// The entry carried by the notification.
    #[must_use]
    pub const fn entry(&self) -> &StreamEntry {
        match self {
            Self::NewStream { entry, .. } | Self::Update { entry, .. } => entry,
        }
    }

    /// Kind of the notification.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::NewStream { .. } => NotificationKind::NewStream,
            Self::Update { .. } => NotificationKind::Update,
        }
    }

    /// The update reason, if this is an update.
    #[must_use]
    pub const fn reason(&self) -> Option<UpdateReason> {
        match self {
            Self::Update { reason, .. } => Some(*reason),
            Self::NewStream { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_serialized_tags() {
        let entry = StreamEntry::new("twitch", "s1", "c1", Utc.timestamp_opt(10, 0).unwrap());

        let new = Notification::NewStream {
            origin: NewStreamOrigin::NewChannel,
            entry: entry.clone(),
        };
        let value = serde_json::to_value(&new).unwrap();
        assert_eq!(value["type"], json!("new-stream"));
        assert_eq!(value["origin"], json!("new_channel"));
        assert_eq!(value["entry"]["id"], json!("s1"));

        let update = Notification::Update {
            reason: UpdateReason::WentOffline,
            entry,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], json!("update"));
        assert_eq!(value["reason"], json!("went_offline"));
    }

    #[test]
    fn test_accessors() {
        let entry = StreamEntry::new("twitch", "s1", "c1", Utc.timestamp_opt(10, 0).unwrap());
        let update = Notification::Update {
            reason: UpdateReason::TimedOut,
            entry,
        };

        assert_eq!(update.kind(), NotificationKind::Update);
        assert_eq!(update.reason(), Some(UpdateReason::TimedOut));
        assert_eq!(update.entry().id, "s1");
    }
}
