//! Runtime configuration.
//!
//! Every knob has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LiveResult, ValidationError};

/// Default offline timeout: entries offline for longer are removed.
pub const DEFAULT_OFFLINE_TIMEOUT_SECS: u64 = 600;
/// Default grace period for entries whose channel is no longer polled.
pub const DEFAULT_UNUSED_CHANNEL_GRACE_SECS: u64 = 3600;
/// Default quiet interval before a requested save is written.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 250;

/// Tunables for reconciliation, persistence and delivery.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Seconds an entry may stay offline before it is removed.
    pub offline_timeout_secs: u64,
    /// Seconds an unreported entry on an unpolled channel is kept, counted
    /// from its last check.
    pub unused_channel_grace_secs: u64,
    /// Quiet interval after the last save request before the list is written.
    pub save_debounce_ms: u64,
    /// Per-subscriber notification buffer.
    pub notification_capacity: usize,
    /// Max queued events in the runtime before `try_submit` reports backpressure.
    pub queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            offline_timeout_secs: DEFAULT_OFFLINE_TIMEOUT_SECS,
            unused_channel_grace_secs: DEFAULT_UNUSED_CHANNEL_GRACE_SECS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            notification_capacity: 1024,
            queue_capacity: 1024,
        }
    }
}

impl LiveConfig {
    /// Parses a JSON config document; missing keys take their defaults.
    pub fn from_json_str(raw: &str) -> LiveResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("invalid config JSON: {e}"),
        })?;
        config.validate()
    }

    /// Checks the configuration, returning it unchanged when valid.
    pub fn validate(self) -> LiveResult<Self> {
        let invalid = |reason: &str| -> LiveResult<Self> {
            Err(ValidationError::InvalidConfig {
                reason: reason.to_string(),
            }
            .into())
        };

        if self.offline_timeout_secs == 0 {
            return invalid("offline_timeout_secs must be positive");
        }
        if self.save_debounce_ms == 0 {
            return invalid("save_debounce_ms must be positive");
        }
        if self.notification_capacity == 0 {
            return invalid("notification_capacity must be at least 1");
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be at least 1");
        }
        if self.offline_timeout_secs > MAX_SPAN_SECS || self.unused_channel_grace_secs > MAX_SPAN_SECS {
            return invalid("timeouts exceed the representable time span");
        }

        Ok(self)
    }

    /// Offline timeout as a wall-clock span.
    #[must_use]
    pub fn offline_timeout(&self) -> chrono::Duration {
        seconds(self.offline_timeout_secs)
    }

    /// Unused-channel grace period as a wall-clock span.
    #[must_use]
    pub fn unused_channel_grace(&self) -> chrono::Duration {
        seconds(self.unused_channel_grace_secs)
    }

    /// Save debounce window.
    #[must_use]
    pub const fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

// Largest second count chrono::Duration accepts.
const MAX_SPAN_SECS: u64 = (i64::MAX / 1000) as u64;

#[allow(clippy::cast_possible_wrap)]
fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_SPAN_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LiveConfig::default().validate().unwrap();
        assert_eq!(cfg.unused_channel_grace(), chrono::Duration::seconds(3600));
        assert_eq!(cfg.save_debounce(), Duration::from_millis(250));
        assert_eq!(cfg.offline_timeout(), chrono::Duration::seconds(600));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let cfg = LiveConfig::from_json_str(r#"{ "offline_timeout_secs": 900 }"#).unwrap();
        assert_eq!(cfg.offline_timeout_secs, 900);
        assert_eq!(cfg.save_debounce_ms, DEFAULT_SAVE_DEBOUNCE_MS);
        assert_eq!(cfg.unused_channel_grace_secs, DEFAULT_UNUSED_CHANNEL_GRACE_SECS);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = LiveConfig::from_json_str(r#"{ "offline_timeout_secs": 0 }"#).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("offline_timeout_secs"));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = LiveConfig::from_json_str("not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_rejects_huge_timeout() {
        let cfg = LiveConfig {
            offline_timeout_secs: u64::MAX,
            ..LiveConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
