//! Channel membership tracking.
//!
//! [`ChannelRegistry`] maps each [`Channel`] to the set of connections
//! subscribed to it. It has no locking of its own: the
//! [`crate::service::ConnectionManager`] owns it behind the same lock as the
//! connection table so both sides are mutated together.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Channel, ConnectionId};

/// Subscriber sets for the fixed channel set.
#[derive(Debug)]
pub struct ChannelRegistry {
    subscribers: HashMap<Channel, HashSet<ConnectionId>>,
}

impl ChannelRegistry {
    /// Creates a registry with an empty subscriber set for every channel.
    #[must_use]
    pub fn new() -> Self {
        let subscribers = Channel::ALL
            .into_iter()
            .map(|channel| (channel, HashSet::new()))
            .collect();
        Self { subscribers }
    }

    /// Adds `id` to `channel`. Returns `true` if it was not already a member.
    pub fn insert(&mut self, channel: Channel, id: ConnectionId) -> bool {
        self.subscribers.entry(channel).or_default().insert(id)
    }

    /// Removes `id` from `channel`. Returns `true` if it was a member.
    pub fn remove(&mut self, channel: Channel, id: ConnectionId) -> bool {
        self.subscribers
            .get_mut(&channel)
            .is_some_and(|set| set.remove(&id))
    }

    /// Iterates over the current subscribers of `channel`.
    pub fn subscribers(&self, channel: Channel) -> impl Iterator<Item = ConnectionId> + '_ {
        self.subscribers
            .get(&channel)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscribers.get(&channel).map_or(0, HashSet::len)
    }

    /// Subscriber counts for every channel, including empty ones.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<Channel, usize> {
        Channel::ALL
            .into_iter()
            .map(|channel| (channel, self.subscriber_count(channel)))
            .collect()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
