//! Structural diff and merge.
//!
//! Diffing walks the *new* value and copies every field that differs into the
//! old value, recording the name of each copied field:
//! - structured (non-array) objects on both sides are recursed into, and the
//!   nested keys are reported under their own names, never the parent key
//! - arrays are atomic: compared as a whole and replaced wholesale
//! - fields missing from the new value leave the old value untouched
//!
//! Stream entries are merged through [`merge`], which also applies the two
//! merge rules the reconciler relies on: the stored `photoId` is dropped and
//! the incoming `insertTime` is ignored.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::entry::{fields, ChannelInfo, StreamEntry};

/// Names of the fields a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: BTreeSet<String>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a changed field.
    pub fn insert(&mut self, field: impl Into<String>) {
        self.fields.insert(field.into());
    }

    /// True when `field` changed.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// True when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Changed field names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// True when the offline or timeout flag flipped.
    #[must_use]
    pub fn touches_state_flags(&self) -> bool {
        self.contains(fields::IS_OFFLINE) || self.contains(fields::IS_TIMEOUT)
    }

    /// True when the displayed status or game changed.
    #[must_use]
    pub fn touches_content(&self) -> bool {
        self.contains(fields::STATUS) || self.contains(fields::GAME)
    }
}

/// Types that can absorb a newer version of themselves field by field.
pub trait Diff {
    /// Copies every differing field of `new` into `self`, recording its name.
    fn diff_into(&mut self, new: &Self, changes: &mut ChangeSet);
}

/// Replaces `old` with `new` when they differ.
fn merge_field<T: PartialEq + Clone>(old: &mut T, new: &T, field: &str, changes: &mut ChangeSet) {
    if old != new {
        *old = new.clone();
        changes.insert(field);
    }
}

/// Like [`merge_field`], but `None` on the new side means "absent".
fn merge_present<T: PartialEq + Clone>(old: &mut Option<T>, new: &Option<T>, field: &str, changes: &mut ChangeSet) {
    if new.is_some() {
        merge_field(old, new, field, changes);
    }
}

impl Diff for Map<String, Value> {
    fn diff_into(&mut self, new: &Self, changes: &mut ChangeSet) {
        for (key, value) in new {
            match (self.get_mut(key), value) {
                (Some(Value::Object(old_obj)), Value::Object(new_obj)) => {
                    old_obj.diff_into(new_obj, changes);
                }
                (Some(old_value), _) => merge_field(old_value, value, key, changes),
                (None, _) => {
                    self.insert(key.clone(), value.clone());
                    changes.insert(key.as_str());
                }
            }
        }
    }
}

impl Diff for ChannelInfo {
    fn diff_into(&mut self, new: &Self, changes: &mut ChangeSet) {
        merge_present(&mut self.status, &new.status, fields::STATUS, changes);
        merge_present(&mut self.game, &new.game, fields::GAME, changes);
        self.extra.diff_into(&new.extra, changes);
    }
}

impl Diff for StreamEntry {
    fn diff_into(&mut self, new: &Self, changes: &mut ChangeSet) {
        merge_field(&mut self.id, &new.id, fields::ID, changes);
        merge_field(&mut self.service, &new.service, fields::SERVICE, changes);
        merge_field(&mut self.channel_id, &new.channel_id, fields::CHANNEL_ID, changes);
        merge_field(&mut self.is_offline, &new.is_offline, fields::IS_OFFLINE, changes);
        merge_field(&mut self.is_timeout, &new.is_timeout, fields::IS_TIMEOUT, changes);
        merge_field(&mut self.check_time, &new.check_time, fields::CHECK_TIME, changes);
        merge_present(
            &mut self.offline_start_time,
            &new.offline_start_time,
            fields::OFFLINE_START_TIME,
            changes,
        );
        merge_present(&mut self.insert_time, &new.insert_time, fields::INSERT_TIME, changes);
        merge_present(&mut self.notify_time, &new.notify_time, fields::NOTIFY_TIME, changes);
        merge_present(&mut self.photo_id, &new.photo_id, fields::PHOTO_ID, changes);
        self.channel.diff_into(&new.channel, changes);
        self.extra.diff_into(&new.extra, changes);
    }
}

/// Result of merging an observation into a stored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    /// The merged entry, ready to replace the stored one.
    pub entry: StreamEntry,
    /// Fields whose value differs from the stored entry.
    pub changes: ChangeSet,
}

/// Merges `incoming` into a copy of `stored`.
///
/// The stored `insertTime` always survives and the stored `photoId` is
/// always dropped before the diff.
#[must_use]
pub fn merge(stored: &StreamEntry, mut incoming: StreamEntry) -> Merge {
    let mut entry = stored.clone();
    entry.photo_id = None;
    incoming.insert_time = None;

    let mut changes = ChangeSet::new();
    entry.diff_into(&incoming, &mut changes);
    Merge { entry, changes }
}
