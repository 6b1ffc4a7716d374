//! Key → subscribed connections, with a reverse index for purging.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use dashmap::DashMap;

use chatline_core::types::id::ConnectionId;

use super::tracker::SubscriptionTracker;

/// Concurrent subscription index.
///
/// Used for both conversation subscriptions (`ConversationId` keys) and
/// presence watches (watched `UserId` keys). An entry whose subscriber
/// set becomes empty is removed rather than kept as a placeholder.
#[derive(Debug)]
pub struct SubscriptionIndex<K: Eq + Hash> {
    /// Key → subscribed connection IDs.
    subscribers: DashMap<K, HashSet<ConnectionId>>,
    /// Reverse index.
    tracker: SubscriptionTracker<K>,
}

impl<K> SubscriptionIndex<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            tracker: SubscriptionTracker::new(),
        }
    }

    /// Subscribes a connection. Returns `false` if it already was.
    pub fn subscribe(&self, key: K, conn_id: ConnectionId) -> bool {
        let added = self
            .subscribers
            .entry(key.clone())
            .or_default()
            .insert(conn_id);
        self.tracker.add(conn_id, key);
        added
    }

    /// Unsubscribes a connection. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, key: &K, conn_id: ConnectionId) -> bool {
        let (removed, emptied) = match self.subscribers.get_mut(key) {
            Some(mut ids) => {
                let removed = ids.remove(&conn_id);
                (removed, ids.is_empty())
            }
            None => (false, false),
        };
        if emptied {
            self.subscribers.remove_if(key, |_, ids| ids.is_empty());
        }
        self.tracker.remove(conn_id, key);
        removed
    }

    /// Removes a connection from every key it is subscribed under.
    ///
    /// Returns the keys it was removed from.
    pub fn remove_connection(&self, conn_id: ConnectionId) -> Vec<K> {
        let keys = self.tracker.remove_all(conn_id);
        let mut purged = Vec::with_capacity(keys.len());
        for key in keys {
            let emptied = match self.subscribers.get_mut(&key) {
                Some(mut ids) => {
                    ids.remove(&conn_id);
                    ids.is_empty()
                }
                None => false,
            };
            if emptied {
                self.subscribers.remove_if(&key, |_, ids| ids.is_empty());
            }
            purged.push(key);
        }
        purged
    }

    /// Connections subscribed under `key`.
    pub fn subscribers(&self, key: &K) -> Vec<ConnectionId> {
        self.subscribers
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `conn_id` is subscribed under `key`.
    pub fn is_subscribed(&self, key: &K, conn_id: ConnectionId) -> bool {
        self.subscribers
            .get(key)
            .map(|ids| ids.contains(&conn_id))
            .unwrap_or(false)
    }

    /// Keys a connection is subscribed under.
    pub fn keys_for(&self, conn_id: ConnectionId) -> Vec<K> {
        self.tracker.keys(conn_id)
    }

    /// Number of subscriptions a connection holds.
    pub fn subscription_count(&self, conn_id: ConnectionId) -> usize {
        self.tracker.count(conn_id)
    }

    /// Number of keys with at least one subscriber.
    pub fn key_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether any entry still references `conn_id`. Linear scan; for
    /// diagnostics and tests.
    pub fn references(&self, conn_id: ConnectionId) -> bool {
        self.subscribers
            .iter()
            .any(|entry| entry.value().contains(&conn_id))
    }
}

impl<K> Default for SubscriptionIndex<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
