//! Reverse index: which keys a connection is subscribed under.

use std::collections::HashSet;
use std::hash::Hash;

use dashmap::DashMap;

use chatline_core::types::id::ConnectionId;

/// Tracks connection → subscribed keys.
#[derive(Debug)]
pub struct SubscriptionTracker<K: Eq + Hash> {
    by_connection: DashMap<ConnectionId, HashSet<K>>,
}

impl<K: Eq + Hash + Clone> SubscriptionTracker<K> {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            by_connection: DashMap::new(),
        }
    }

    /// Records a subscription.
    pub fn add(&self, conn_id: ConnectionId, key: K) {
        self.by_connection.entry(conn_id).or_default().insert(key);
    }

    /// Removes a subscription, dropping the connection entry once empty.
    pub fn remove(&self, conn_id: ConnectionId, key: &K) {
        let emptied = match self.by_connection.get_mut(&conn_id) {
            Some(mut keys) => {
                keys.remove(key);
                keys.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_connection.remove_if(&conn_id, |_, keys| keys.is_empty());
        }
    }

    /// Keys a connection is subscribed under.
    pub fn keys(&self, conn_id: ConnectionId) -> Vec<K> {
        self.by_connection
            .get(&conn_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of subscriptions of a connection.
    pub fn count(&self, conn_id: ConnectionId) -> usize {
        self.by_connection
            .get(&conn_id)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    /// Removes and returns every key of a connection.
    pub fn remove_all(&self, conn_id: ConnectionId) -> HashSet<K> {
        self.by_connection
            .remove(&conn_id)
            .map(|(_, keys)| keys)
            .unwrap_or_default()
    }
}

impl<K: Eq + Hash + Clone> Default for SubscriptionTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
