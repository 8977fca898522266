//! Stream entries and the live list.
//!
//! A [`StreamEntry`] is one observed live stream instance. Pollers produce
//! fresh entries every pass; the reconciler keeps the authoritative copies in
//! a [`LiveList`] and merges new observations into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire names of the fields the reconciler reasons about.
///
/// Change sets report fields under these names; nested `channel` keys are
/// reported under their own names, never as `channel`.
pub mod fields {
    #![allow(missing_docs)]

    pub const ID: &str = "id";
    pub const SERVICE: &str = "service";
    pub const CHANNEL_ID: &str = "channelId";
    pub const IS_OFFLINE: &str = "isOffline";
    pub const IS_TIMEOUT: &str = "isTimeout";
    pub const OFFLINE_START_TIME: &str = "offlineStartTime";
    pub const CHECK_TIME: &str = "checkTime";
    pub const INSERT_TIME: &str = "insertTime";
    pub const NOTIFY_TIME: &str = "notifyTime";
    pub const PHOTO_ID: &str = "photoId";
    pub const STATUS: &str = "status";
    pub const GAME: &str = "game";

    /// Key stripped from entries before they are logged.
    pub const PREVIEW: &str = "preview";
}

/// Descriptive channel data attached to an entry.
///
/// `status` (usually the stream title) and `game` (content category) drive
/// notifications and duplicate matching; every other key is carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Stream title as shown by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Content category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,

    /// Other channel keys, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One tracked live stream observation.
///
/// Optional fields that are `None` on an incoming entry are treated as absent
/// by the merge: they never erase what the stored entry already has.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use livewatch::StreamEntry;
///
/// let entry = StreamEntry::new("twitch", "v1", "chan", Utc::now())
///     .with_channel("Any% attempts", "Celeste");
/// assert!(!entry.is_offline);
/// assert_eq!(entry.channel.game.as_deref(), Some("Celeste"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    /// Service-assigned stream id; the identity key while it stays stable.
    pub id: String,

    /// Polling service the entry belongs to.
    pub service: String,

    /// Channel that carries the stream.
    pub channel_id: String,

    /// No longer reported while its channel is still polled.
    #[serde(default)]
    pub is_offline: bool,

    /// On an incoming entry: the source reports the whole channel as timed out.
    #[serde(default)]
    pub is_timeout: bool,

    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    /// When the entry was first seen offline.
    pub offline_start_time: Option<DateTime<Utc>>,

    /// Last time a poll reported this entry.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub check_time: DateTime<Utc>,

    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    /// When the entry was first recorded. Survives every merge.
    pub insert_time: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    /// When the new-stream notification went out.
    pub notify_time: Option<DateTime<Utc>>,

    /// Cached thumbnail handle; invalid after any merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,

    /// Title, category and other channel data.
    #[serde(default)]
    pub channel: ChannelInfo,

    /// Service-specific data the reconciler does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamEntry {
    /// Creates an online entry seen at `check_time`.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        id: impl Into<String>,
        channel_id: impl Into<String>,
        check_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            channel_id: channel_id.into(),
            is_offline: false,
            is_timeout: false,
            offline_start_time: None,
            check_time,
            insert_time: Some(check_time),
            notify_time: None,
            photo_id: None,
            channel: ChannelInfo::default(),
            extra: Map::new(),
        }
    }

    /// Creates the marker a poller sends when a channel timed out at the source.
    #[must_use]
    pub fn timeout_marker(
        service: impl Into<String>,
        channel_id: impl Into<String>,
        check_time: DateTime<Utc>,
    ) -> Self {
        let channel_id = channel_id.into();
        let mut entry = Self::new(service, format!("timeout:{channel_id}"), channel_id, check_time);
        entry.is_timeout = true;
        entry.insert_time = None;
        entry
    }

    /// Sets the channel status and game.
    #[must_use]
    pub fn with_channel(mut self, status: impl Into<String>, game: impl Into<String>) -> Self {
        self.channel.status = Some(status.into());
        self.channel.game = Some(game.into());
        self
    }

    /// Sets an opaque top-level field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Sets the cached photo handle.
    #[must_use]
    pub fn with_photo(mut self, photo_id: impl Into<String>) -> Self {
        self.photo_id = Some(photo_id.into());
        self
    }

    /// JSON form of the entry without its `preview` payload, for log lines.
    #[must_use]
    pub fn log_view(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove(fields::PREVIEW);
        }
        value
    }
}

/// The authoritative ordered list of entries across all services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveList {
    entries: Vec<StreamEntry>,
}

impl LiveList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps previously persisted entries.
    #[must_use]
    pub fn from_entries(entries: Vec<StreamEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries across all services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in list order.
    #[must_use]
    pub fn as_slice(&self) -> &[StreamEntry] {
        &self.entries
    }

    /// Entries in list order.
    pub fn iter(&self) -> impl Iterator<Item = &StreamEntry> {
        self.entries.iter()
    }

    /// Entry at a list position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&StreamEntry> {
        self.entries.get(position)
    }

    /// Looks an entry up by service and id.
    #[must_use]
    pub fn find(&self, service: &str, id: &str) -> Option<&StreamEntry> {
        self.entries.iter().find(|e| e.service == service && e.id == id)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut StreamEntry> {
        self.entries.get_mut(position)
    }

    pub(crate) fn push(&mut self, entry: StreamEntry) {
        self.entries.push(entry);
    }

    /// Removes the entries at `positions`, returning them in list order.
    ///
    /// `positions` must be strictly ascending.
    pub(crate) fn remove_positions(&mut self, positions: &[usize]) -> Vec<StreamEntry> {
        if positions.is_empty() {
            return Vec::new();
        }
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let mut doomed = positions.iter().copied().peekable();
        let mut removed = Vec::with_capacity(positions.len());
        let mut kept = Vec::with_capacity(self.entries.len().saturating_sub(positions.len()));
        for (position, entry) in std::mem::take(&mut self.entries).into_iter().enumerate() {
            if doomed.next_if_eq(&position).is_some() {
                removed.push(entry);
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
        removed
    }

    /// Consumes the list, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<StreamEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_wire_format_uses_camel_case_and_seconds() {
        let entry = StreamEntry::new("twitch", "s1", "c1", t(1_700_000_000)).with_channel("title", "game");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["channelId"], json!("c1"));
        assert_eq!(value["checkTime"], json!(1_700_000_000));
        assert_eq!(value["insertTime"], json!(1_700_000_000));
        assert_eq!(value["channel"]["status"], json!("title"));
        assert!(value.get("photoId").is_none());
        assert!(value.get("notifyTime").is_none());
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let raw = json!({
            "id": "s1",
            "service": "youtube",
            "channelId": "c1",
            "checkTime": 100,
            "viewers": 12,
            "channel": { "status": "live", "url": "https://example.invalid/c1" }
        });

        let entry: StreamEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.extra["viewers"], json!(12));
        assert_eq!(entry.channel.extra["url"], json!("https://example.invalid/c1"));
        assert!(!entry.is_offline);
        assert!(entry.insert_time.is_none());

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["viewers"], json!(12));
        assert_eq!(back["channel"]["url"], raw["channel"]["url"]);
    }

    #[test]
    fn test_log_view_strips_preview() {
        let entry = StreamEntry::new("twitch", "s1", "c1", t(0))
            .with_extra("preview", json!(["https://img/1.jpg"]))
            .with_extra("viewers", json!(3));

        let view = entry.log_view();
        assert!(view.get("preview").is_none());
        assert_eq!(view["viewers"], json!(3));
    }

    #[test]
    fn test_timeout_marker() {
        let marker = StreamEntry::timeout_marker("twitch", "c9", t(5));
        assert!(marker.is_timeout);
        assert_eq!(marker.channel_id, "c9");
        assert!(marker.insert_time.is_none());
    }

    #[test]
    fn test_remove_positions_keeps_order() {
        let mut list = LiveList::from_entries(
            ["a", "b", "c", "d"]
                .iter()
                .map(|id| StreamEntry::new("s", *id, "c", t(0)))
                .collect(),
        );

        let removed = list.remove_positions(&[1, 3]);
        let removed_ids: Vec<&str> = removed.iter().map(|e| e.id.as_str()).collect();
        let kept_ids: Vec<&str> = list.iter().map(|e| e.id.as_str()).collect();

        assert_eq!(removed_ids, vec!["b", "d"]);
        assert_eq!(kept_ids, vec!["a", "c"]);
    }

    #[test]
    fn test_remove_positions_walks_large_list_once() {
        let mut list = LiveList::from_entries(
            (0..1000)
                .map(|i| StreamEntry::new("s", format!("v{i}"), "c", t(0)))
                .collect(),
        );
        let doomed: Vec<usize> = (0..1000).step_by(2).chain([1000, 1001]).collect();

        let removed = list.remove_positions(&doomed);

        assert_eq!(removed.len(), 500);
        assert_eq!(list.len(), 500);
        assert_eq!(removed[0].id, "v0");
        assert_eq!(removed[499].id, "v998");
        assert!(list.iter().enumerate().all(|(i, e)| e.id == format!("v{}", 2 * i + 1)));
    }

    #[test]
    fn test_find_is_scoped_by_service() {
        let list = LiveList::from_entries(vec![
            StreamEntry::new("twitch", "x", "c", t(0)),
            StreamEntry::new("youtube", "x", "c", t(0)),
        ]);

        assert_eq!(list.find("youtube", "x").unwrap().service, "youtube");
        assert!(list.find("goodgame", "x").is_none());
    }
}
