//! The reconciliation state machine.
//!
//! One pass consumes one service's poll result and brings the live list in
//! line with it. Per entry the lifecycle is
//!
//! ```text
//! New → Online ⇄ OfflinePending → Removed
//! ```
//!
//! with an orthogonal timeout flag that the source can set on Online or
//! OfflinePending entries and that only a later match clears.
//!
//! Passes are pure with respect to the outside world: they mutate the list
//! and return the notifications to emit, and the caller delivers them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::config::LiveConfig;
use crate::diff::{merge, Merge};
use crate::entry::{LiveList, StreamEntry};
use crate::error::{LiveResult, ValidationError};
use crate::index::LiveIndex;
use crate::matcher::find_duplicate;
use crate::notify::{NewStreamOrigin, Notification, NotificationKind, UpdateReason};

/// One poll of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    /// Service the poll covers; only entries of this service are reconciled.
    pub service: String,
    /// Entries currently reported live, in poller order.
    #[serde(default)]
    pub entries: Vec<StreamEntry>,
    /// Channels the poller is watching for this service.
    #[serde(default)]
    pub channel_ids: HashSet<String>,
}

impl PollResult {
    /// Builds a poll result from entries and the watched channel ids.
    #[must_use]
    pub fn new<I, S>(service: impl Into<String>, entries: Vec<StreamEntry>, channel_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            entries,
            channel_ids: channel_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Rejects entries the reconciler cannot key: a missing id (except on
    /// timeout markers, which are keyed by channel), a missing channel, or an
    /// entry belonging to another service.
    fn validate(&self) -> LiveResult<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            let missing = if entry.channel_id.is_empty() {
                Some("channelId")
            } else if entry.id.is_empty() && !entry.is_timeout {
                Some("id")
            } else if entry.service != self.service {
                Some("service")
            } else {
                None
            };

            if let Some(field) = missing {
                return Err(ValidationError::MalformedEntry {
                    service: self.service.clone(),
                    index,
                    field,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Time thresholds applied to entries a pass did not see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Offline entries older than this are removed.
    pub offline_timeout: chrono::Duration,
    /// Entries of unpolled channels unchecked for longer than this are removed.
    pub unused_channel_grace: chrono::Duration,
}

impl From<&LiveConfig> for ReconcilePolicy {
    fn from(config: &LiveConfig) -> Self {
        Self {
            offline_timeout: config.offline_timeout(),
            unused_channel_grace: config.unused_channel_grace(),
        }
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::from(&LiveConfig::default())
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Service the pass ran for.
    pub service: String,
    /// Notifications to emit, in the order the transitions happened.
    pub notifications: Vec<Notification>,
    /// Entries evicted from the list, in former list order.
    pub removed: Vec<StreamEntry>,
    /// Entries appended as new streams.
    pub appended: usize,
    /// Incoming entries merged into stored ones.
    pub merged: usize,
}

impl PassReport {
    fn new(service: String) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    /// Number of notifications of the given kind.
    #[must_use]
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications.iter().filter(|n| n.kind() == kind).count()
    }

    /// True when the pass changed nothing worth telling anyone about.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.notifications.is_empty() && self.removed.is_empty()
    }
}

/// Owner of the live list; applies poll results to it.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    list: LiveList,
    policy: ReconcilePolicy,
}

impl Reconciler {
    /// Takes ownership of a previously loaded list.
    #[must_use]
    pub fn new(list: LiveList, policy: ReconcilePolicy) -> Self {
        Self { list, policy }
    }

    /// Current live list.
    #[must_use]
    pub fn list(&self) -> &LiveList {
        &self.list
    }

    /// Gives up the reconciler, keeping its list.
    #[must_use]
    pub fn into_list(self) -> LiveList {
        self.list
    }

    /// Thresholds in effect.
    #[must_use]
    pub const fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Replaces the thresholds used from the next pass on.
    pub fn set_policy(&mut self, policy: ReconcilePolicy) {
        self.policy = policy;
    }

    /// Runs one reconciliation pass for `poll.service` at time `now`.
    ///
    /// # Errors
    /// Returns `ValidationError::MalformedEntry` before touching the list if
    /// any incoming entry cannot be keyed.
    pub fn reconcile(&mut self, poll: PollResult, now: DateTime<Utc>) -> LiveResult<PassReport> {
        poll.validate()?;

        let PollResult {
            service,
            entries,
            channel_ids,
        } = poll;
        let span = debug_span!("reconcile", service = %service, incoming = entries.len());
        let _enter = span.enter();

        let mut index = LiveIndex::build(&service, &self.list);
        let mut report = PassReport::new(service);

        for incoming in entries {
            if incoming.is_timeout {
                self.mark_channel_timeout(&mut index, &incoming.channel_id, &mut report);
                continue;
            }

            if let Some(position) = index.consume(&incoming.id) {
                self.merge_identity(position, incoming, &mut report);
                continue;
            }

            let Some(channel_positions) = index.channel(&incoming.channel_id) else {
                self.append(incoming, now, NewStreamOrigin::NewChannel, &mut report);
                continue;
            };

            let duplicate = find_duplicate(&self.list, channel_positions, &incoming).map(str::to_owned);
            match duplicate.and_then(|id| index.consume(&id)) {
                Some(position) => self.merge_duplicate(position, incoming, &mut report),
                None => self.append(incoming, now, NewStreamOrigin::ExtraStream, &mut report),
            }
        }

        self.sweep(&index, &channel_ids, now, &mut report);

        debug!(
            appended = report.appended,
            merged = report.merged,
            removed = report.removed.len(),
            notifications = report.notifications.len(),
            "pass complete"
        );
        Ok(report)
    }

    fn mark_channel_timeout(&mut self, index: &mut LiveIndex, channel_id: &str, report: &mut PassReport) {
        let Some(positions) = index.channel(channel_id).map(<[usize]>::to_vec) else {
            return;
        };

        for position in positions {
            let Some(entry) = self.list.get_mut(position) else {
                continue;
            };
            index.consume(&entry.id);

            if !entry.is_timeout {
                entry.is_timeout = true;
                debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "timeout");
                report.notifications.push(Notification::Update {
                    reason: UpdateReason::TimedOut,
                    entry: entry.clone(),
                });
            }
        }
    }

    fn merge_at(&mut self, position: usize, incoming: StreamEntry) -> Option<Merge> {
        let stored = self.list.get_mut(position)?;
        let merged = merge(stored, incoming);
        *stored = merged.entry.clone();
        Some(merged)
    }

    fn merge_identity(&mut self, position: usize, incoming: StreamEntry, report: &mut PassReport) {
        let Some(Merge { entry, changes }) = self.merge_at(position, incoming) else {
            return;
        };
        report.merged += 1;

        let reason = if changes.touches_state_flags() {
            UpdateReason::Online
        } else if changes.touches_content() {
            UpdateReason::ContentChanged
        } else {
            return;
        };

        debug!(channel = %entry.channel_id, id = %entry.id, ?reason, entry = %entry.log_view(), "update");
        report.notifications.push(Notification::Update { reason, entry });
    }

    // Content changes on a duplicate match stay silent; only flag flips notify.
    fn merge_duplicate(&mut self, position: usize, incoming: StreamEntry, report: &mut PassReport) {
        let Some(Merge { entry, changes }) = self.merge_at(position, incoming) else {
            return;
        };
        report.merged += 1;

        if changes.touches_state_flags() {
            debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "online via duplicate");
            report.notifications.push(Notification::Update {
                reason: UpdateReason::Recovered,
                entry,
            });
        } else {
            debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "duplicate refreshed");
        }
    }

    fn append(&mut self, mut incoming: StreamEntry, now: DateTime<Utc>, origin: NewStreamOrigin, report: &mut PassReport) {
        incoming.notify_time = Some(now);
        incoming.insert_time.get_or_insert(now);

        debug!(
            channel = %incoming.channel_id,
            id = %incoming.id,
            ?origin,
            entry = %incoming.log_view(),
            "new stream"
        );
        report.notifications.push(Notification::NewStream {
            origin,
            entry: incoming.clone(),
        });
        self.list.push(incoming);
        report.appended += 1;
    }

    fn sweep(&mut self, index: &LiveIndex, channel_ids: &HashSet<String>, now: DateTime<Utc>, report: &mut PassReport) {
        let policy = self.policy;
        let mut expired = Vec::new();

        for position in index.unconsumed() {
            let Some(entry) = self.list.get_mut(position) else {
                continue;
            };

            if !channel_ids.contains(&entry.channel_id) {
                if now - entry.check_time > policy.unused_channel_grace {
                    debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "remove unused");
                    expired.push(position);
                }
                continue;
            }

            if !entry.is_offline {
                entry.is_offline = true;
                entry.offline_start_time = Some(now);
                debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "offline");
                report.notifications.push(Notification::Update {
                    reason: UpdateReason::WentOffline,
                    entry: entry.clone(),
                });
                continue;
            }

            match entry.offline_start_time {
                Some(since) if now - since > policy.offline_timeout => {
                    debug!(channel = %entry.channel_id, id = %entry.id, entry = %entry.log_view(), "remove");
                    expired.push(position);
                }
                Some(_) => {}
                None => entry.offline_start_time = Some(now),
            }
        }

        report.removed = self.list.remove_positions(&expired);
    }
}
