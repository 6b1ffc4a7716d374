//! Connection table and user index.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use chatline_core::types::id::{ConnectionId, UserId};

use super::handle::ConnectionHandle;

/// Thread-safe table of live connections, indexed by connection and user.
///
/// Mutations (`add`/`remove`) are only issued by the hub control loop, so
/// the first-in/last-out answers they return are exact.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// Connection ID → handle.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// User ID → that user's connection IDs. Never holds an empty set.
    by_user: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionPool {
    /// Creates a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Returns `true` if it is the user's first.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> bool {
        let user_id = handle.user_id;
        let conn_id = handle.id;
        self.by_id.insert(conn_id, handle);

        let mut ids = self.by_user.entry(user_id).or_default();
        let first = ids.is_empty();
        ids.insert(conn_id);
        first
    }

    /// Removes a connection from the table and the user index.
    ///
    /// Returns the handle and whether it was the user's last connection.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<(Arc<ConnectionHandle>, bool)> {
        let (_, handle) = self.by_id.remove(conn_id)?;

        let mut last = false;
        if let Some(mut ids) = self.by_user.get_mut(&handle.user_id) {
            ids.remove(conn_id);
            last = ids.is_empty();
        }
        if last {
            self.by_user
                .remove_if(&handle.user_id, |_, ids| ids.is_empty());
        }

        Some((handle, last))
    }

    /// Gets a connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Whether the connection is registered.
    pub fn contains(&self, conn_id: &ConnectionId) -> bool {
        self.by_id.contains_key(conn_id)
    }

    /// Connection IDs of a user.
    pub fn user_connection_ids(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live connections of a user.
    pub fn user_connection_count(&self, user_id: &UserId) -> usize {
        self.by_user.get(user_id).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Connections idle for longer than `timeout`.
    pub fn stale_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        self.by_id
            .iter()
            .filter(|entry| entry.value().idle_for() > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// All connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All users with at least one connection.
    pub fn online_user_ids(&self) -> Vec<UserId> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }

    /// Total live connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Users with at least one connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
