//! Duplicate matching across service-side id churn.
//!
//! When a stream restarts, some services hand out a new id while the channel
//! shows the same title and game. Such an observation is matched back to the
//! earlier entry so its identity (and insert time) carry over.

use crate::entry::{LiveList, StreamEntry};

/// Returns the id of the first entry in `channel_positions` whose status and
/// game both equal the candidate's.
///
/// The scan does not skip entries already matched this pass, so the caller
/// must check the returned id is still unconsumed before merging into it.
///
/// Two unrelated streams on one channel with identical status and game text
/// are indistinguishable here and will share one identity.
#[must_use]
pub fn find_duplicate<'a>(
    list: &'a LiveList,
    channel_positions: &[usize],
    candidate: &StreamEntry,
) -> Option<&'a str> {
    channel_positions
        .iter()
        .filter_map(|&position| list.get(position))
        .find(|entry| {
            entry.channel.status == candidate.channel.status && entry.channel.game == candidate.channel.game
        })
        .map(|entry| entry.id.as_str())
}
