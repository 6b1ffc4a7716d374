//! Presence tracker: watcher index, last-seen times and the transition worker.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatline_core::traits::PresenceStore;
use chatline_core::types::id::{ConnectionId, UserId};

use super::status::UserStatus;
use crate::hub::Hub;
use crate::message::{OutboundFrame, events};
use crate::subscription::SubscriptionIndex;

/// Online/offline edge produced by the hub control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First connection of `user_id` was registered as `conn_id`.
    Online {
        user_id: UserId,
        conn_id: ConnectionId,
    },
    /// Last connection of `user_id` went away.
    Offline {
        user_id: UserId,
        last_seen: DateTime<Utc>,
    },
}

/// Tracks who watches whose status and announces transitions.
///
/// Online state itself is derived from the hub's user index; this type
/// only holds the watcher index and offline timestamps.
pub struct PresenceTracker {
    /// Watched user → watching connections.
    watchers: SubscriptionIndex<UserId>,
    /// User → when their last connection went away.
    last_seen: DashMap<UserId, DateTime<Utc>>,
    store: RwLock<Option<Arc<dyn PresenceStore>>>,
    transitions: mpsc::UnboundedSender<PresenceTransition>,
    settle_delay: Duration,
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("watched_users", &self.watchers.key_count())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

impl PresenceTracker {
    /// Create a tracker and the receiving end of its transition queue.
    pub(crate) fn new(
        settle_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PresenceTransition>) {
        let (transitions, rx) = mpsc::unbounded_channel();
        let tracker = Self {
            watchers: SubscriptionIndex::new(),
            last_seen: DashMap::new(),
            store: RwLock::new(None),
            transitions,
            settle_delay,
        };
        (tracker, rx)
    }

    /// Bind the presence store.
    pub(crate) fn set_store(&self, store: Arc<dyn PresenceStore>) {
        let mut guard = self.store.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(store);
    }

    fn store(&self) -> Option<Arc<dyn PresenceStore>> {
        self.store.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Queue the online edge for a user.
    pub(crate) fn user_came_online(&self, user_id: UserId, conn_id: ConnectionId) {
        self.last_seen.remove(&user_id);
        self.queue(PresenceTransition::Online { user_id, conn_id });
    }

    /// Record last-seen and queue the offline edge.
    pub(crate) fn user_went_offline(&self, user_id: UserId) {
        let last_seen = Utc::now();
        self.last_seen.insert(user_id, last_seen);
        self.queue(PresenceTransition::Offline { user_id, last_seen });
    }

    fn queue(&self, transition: PresenceTransition) {
        if self.transitions.send(transition).is_err() {
            debug!("Presence worker is stopped, transition discarded");
        }
    }

    /// Forget last-seen times older than `retention`. Returns how many were dropped.
    pub(crate) fn prune_last_seen(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;
        let mut dropped = 0;
        self.last_seen.retain(|_, seen| {
            let keep = *seen > cutoff;
            if !keep {
                dropped += 1;
            }
            keep
        });
        dropped
    }

    /// Drop every watch held by a connection. Returns how many there were.
    pub(crate) fn remove_watcher(&self, conn_id: ConnectionId) -> usize {
        self.watchers.remove_connection(conn_id).len()
    }

    /// Current status of a user.
    pub fn status_of(&self, hub: &Hub, user_id: UserId) -> UserStatus {
        if hub.is_user_online(user_id) {
            UserStatus::online(user_id)
        } else {
            let last_seen = self.last_seen.get(&user_id).map(|entry| *entry.value());
            UserStatus::offline(user_id, last_seen)
        }
    }

    /// Start watching `target` from `watcher`.
    ///
    /// Returns the target's current status, or `None` if the watcher is
    /// not a registered connection.
    pub fn subscribe(&self, hub: &Hub, watcher: ConnectionId, target: UserId) -> Option<UserStatus> {
        if !hub.is_registered(watcher) {
            return None;
        }
        self.watchers.subscribe(target, watcher);

        // Unregistration may have purged the index between the two checks.
        if !hub.is_registered(watcher) {
            self.watchers.unsubscribe(&target, watcher);
            return None;
        }
        Some(self.status_of(hub, target))
    }

    /// Stop watching. Returns `false` if no watch existed.
    pub fn unsubscribe(&self, watcher: ConnectionId, target: UserId) -> bool {
        self.watchers.unsubscribe(&target, watcher)
    }

    /// Connections watching `target`.
    pub fn watchers_of(&self, target: UserId) -> Vec<ConnectionId> {
        self.watchers.subscribers(&target)
    }

    /// Users watched by a connection.
    pub fn watched_by(&self, watcher: ConnectionId) -> Vec<UserId> {
        self.watchers.keys_for(watcher)
    }

    /// Users with at least one watcher.
    pub fn watched_count(&self) -> usize {
        self.watchers.key_count()
    }

    /// Apply transitions in order until cancelled.
    pub(crate) async fn run(
        hub: Arc<Hub>,
        mut rx: mpsc::UnboundedReceiver<PresenceTransition>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                transition = rx.recv() => {
                    let Some(transition) = transition else { break };
                    match transition {
                        PresenceTransition::Online { user_id, conn_id } => {
                            hub.presence().announce_online(&hub, user_id, conn_id).await;
                        }
                        PresenceTransition::Offline { user_id, last_seen } => {
                            hub.presence().announce_offline(&hub, user_id, last_seen).await;
                        }
                    }
                }
            }
        }
        debug!("Presence worker stopped");
    }

    async fn announce_online(&self, hub: &Arc<Hub>, user_id: UserId, conn_id: ConnectionId) {
        if let Some(store) = self.store() {
            if let Err(e) = store.set_user_online(user_id).await {
                warn!(user_id = %user_id, error = %e, "Failed to record user online");
            }
        }

        let status = UserStatus::online(user_id);
        let payload = serde_json::to_value(&status).unwrap_or_default();
        let frame = OutboundFrame::event(events::USER_ONLINE, payload);

        let watchers = self.watchers_of(user_id);
        let notified = hub.send_to_clients(&watchers, &frame);
        hub.send_to_client(conn_id, &frame);

        info!(user_id = %user_id, watchers = notified, "User online");

        if self.settle_delay.is_zero() {
            self.push_watched_statuses(hub, user_id, conn_id);
            return;
        }
        let hub = Arc::clone(hub);
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hub.presence().push_watched_statuses(&hub, user_id, conn_id);
        });
    }

    /// Tell a new connection which of the users it watches are online.
    fn push_watched_statuses(&self, hub: &Hub, user_id: UserId, conn_id: ConnectionId) {
        if !hub.is_registered(conn_id) {
            return;
        }
        let mut pushed = 0usize;
        for target in self.watched_by(conn_id) {
            if target == user_id || !hub.is_user_online(target) {
                continue;
            }
            let payload = serde_json::to_value(UserStatus::online(target)).unwrap_or_default();
            if hub.send_to_client(conn_id, &OutboundFrame::event(events::USER_STATUS, payload)) {
                pushed += 1;
            }
        }
        debug!(conn_id = %conn_id, pushed, "Pushed watched user statuses");
    }

    async fn announce_offline(&self, hub: &Hub, user_id: UserId, last_seen: DateTime<Utc>) {
        if let Some(store) = self.store() {
            if let Err(e) = store.set_user_offline(user_id).await {
                warn!(user_id = %user_id, error = %e, "Failed to record user offline");
            }
        }

        let payload = serde_json::to_value(UserStatus::offline(user_id, Some(last_seen)))
            .unwrap_or_default();
        let frame = OutboundFrame::event(events::USER_OFFLINE, payload);
        let notified = hub.send_to_clients(&self.watchers_of(user_id), &frame);

        info!(user_id = %user_id, watchers = notified, "User offline");
    }
}
