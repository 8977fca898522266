//! Per-pass lookup indexes over the live list.

use std::collections::HashMap;

use crate::entry::LiveList;

/// Lookup tables for one service's entries, keyed to list positions.
///
/// Built fresh at the start of every pass and never shared. Positions stay
/// valid for the whole pass because entries are only appended while
/// incoming entries are processed; removals happen after the sweep.
#[derive(Debug, Clone, Default)]
pub struct LiveIndex {
    by_id: HashMap<String, usize>,
    by_channel: HashMap<String, Vec<usize>>,
}

impl LiveIndex {
    /// Indexes the entries of `service`. When two entries share an id the
    /// later one wins the id slot; both stay in the channel list.
    #[must_use]
    pub fn build(service: &str, list: &LiveList) -> Self {
        let mut index = Self::default();
        for (position, entry) in list.iter().enumerate() {
            if entry.service != service {
                continue;
            }
            index.by_id.insert(entry.id.clone(), position);
            index
                .by_channel
                .entry(entry.channel_id.clone())
                .or_default()
                .push(position);
        }
        index
    }

    /// Position of a not-yet-consumed entry.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Positions of the channel's entries in list order, consumed or not.
    #[must_use]
    pub fn channel(&self, channel_id: &str) -> Option<&[usize]> {
        self.by_channel.get(channel_id).map(Vec::as_slice)
    }

    /// Marks an id as matched this pass.
    pub fn consume(&mut self, id: &str) -> Option<usize> {
        self.by_id.remove(id)
    }

    /// Positions never consumed this pass, in list order.
    #[must_use]
    pub fn unconsumed(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.by_id.values().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Number of not-yet-consumed ids.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.by_id.len()
    }
}
