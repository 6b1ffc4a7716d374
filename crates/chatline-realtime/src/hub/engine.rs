//! The hub: connection registry, subscription indexes and delivery.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use chatline_core::config::RealtimeConfig;
use chatline_core::error::{AppError, AppResult};
use chatline_core::traits::{NotificationService, PresenceStore};
use chatline_core::types::ConversationOrder;
use chatline_core::types::id::{BusinessId, ConnectionId, ConversationId, UserId};

use super::envelope::BroadcastMessage;
use super::event_loop::{ControlRequest, HubLoop};
use super::notifier::Notifier;
use super::stats::HubStats;
use crate::collaborators::Collaborators;
use crate::connection::{ConnectionHandle, ConnectionInfo, ConnectionPool, SendOutcome};
use crate::message::builder;
use crate::message::serializer::encode_frame;
use crate::message::{OutboundFrame, events};
use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceTracker;
use crate::ratelimit::TokenBucket;
use crate::subscription::SubscriptionIndex;
use crate::typing::TypingTracker;

/// Capacity of the register/unregister request queue.
const CONTROL_QUEUE_SIZE: usize = 256;

/// Central fan-out hub.
///
/// All registry mutations happen on the control loop ([`HubLoop`]); the
/// methods here either enqueue work for it or read the concurrent indexes.
pub struct Hub {
    config: RealtimeConfig,
    pub(super) pool: ConnectionPool,
    pub(super) conversations: SubscriptionIndex<ConversationId>,
    presence: PresenceTracker,
    typing: Arc<TypingTracker>,
    collaborators: Collaborators,
    notifications: RwLock<Option<Arc<dyn NotificationService>>>,
    notifier: Notifier,
    control_tx: mpsc::Sender<ControlRequest>,
    pub(super) metrics: Arc<RealtimeMetrics>,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.pool.connection_count())
            .field("collaborators", &self.collaborators)
            .finish()
    }
}

impl Hub {
    /// Create a hub and the control loop that drives it.
    ///
    /// Nothing is delivered until [`HubLoop::run`] is spawned.
    pub fn new(config: RealtimeConfig, collaborators: Collaborators) -> (Arc<Self>, HubLoop) {
        let metrics = Arc::new(RealtimeMetrics::new());
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue_size.max(1));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_SIZE);
        let (presence, presence_rx) = PresenceTracker::new(config.presence_settle_delay());

        let notifier = Notifier::new(broadcast_tx, metrics.clone());
        let typing = TypingTracker::new(
            config.typing.clone(),
            notifier.clone(),
            collaborators.users.clone(),
        );

        let hub = Arc::new(Self {
            config,
            pool: ConnectionPool::new(),
            conversations: SubscriptionIndex::new(),
            presence,
            typing,
            collaborators,
            notifications: RwLock::new(None),
            notifier,
            control_tx,
            metrics,
            started_at: Utc::now(),
        });

        let event_loop = HubLoop::new(hub.clone(), control_rx, broadcast_rx, presence_rx);
        (hub, event_loop)
    }

    /// Get the hub configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Get the wired collaborators.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Get the presence tracker.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Get the typing tracker.
    pub fn typing(&self) -> &Arc<TypingTracker> {
        &self.typing
    }

    /// Get the hub counters.
    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.metrics
    }

    /// Producer handle for the broadcast queue.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Attach the presence store after construction.
    pub fn set_presence_store(&self, store: Arc<dyn PresenceStore>) {
        self.presence.set_store(store);
    }

    /// Attach the offline notification service after construction.
    pub fn set_notification_service(&self, service: Arc<dyn NotificationService>) {
        let mut guard = self.notifications.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(service);
    }

    /// Currently bound notification service, if any.
    pub fn notification_service(&self) -> Option<Arc<dyn NotificationService>> {
        self.notifications
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Build a handle sized from configuration. It is not registered yet.
    pub fn new_connection(
        &self,
        user_id: UserId,
        business_id: Option<BusinessId>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Bytes>) {
        let limiter = TokenBucket::new(
            self.config.command_rate_limit_burst,
            self.config.command_rate_limit_interval(),
        );
        let (handle, rx) =
            ConnectionHandle::new(user_id, business_id, self.config.send_buffer_size, limiter);
        (Arc::new(handle), rx)
    }

    /// Create and register a connection for an authenticated user.
    pub async fn connect(
        &self,
        user_id: UserId,
        business_id: Option<BusinessId>,
    ) -> AppResult<(Arc<ConnectionHandle>, mpsc::Receiver<Bytes>)> {
        let (handle, rx) = self.new_connection(user_id, business_id);
        self.register(handle.clone()).await?;
        Ok((handle, rx))
    }

    /// Register a connection and wait until the control loop has applied it.
    pub async fn register(&self, handle: Arc<ConnectionHandle>) -> AppResult<()> {
        let (done, ack) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::Register { handle, done })
            .await
            .map_err(|_| loop_stopped())?;
        ack.await.map_err(|_| loop_stopped())
    }

    /// Unregister a connection. Returns `false` if it was already gone.
    pub async fn unregister(&self, conn_id: ConnectionId) -> AppResult<bool> {
        let (done, ack) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::Unregister { conn_id, done })
            .await
            .map_err(|_| loop_stopped())?;
        ack.await.map_err(|_| loop_stopped())
    }

    /// Apply a registration. Runs on the control loop.
    pub(super) fn add_connection(self: &Arc<Self>, handle: Arc<ConnectionHandle>) {
        let first = self.pool.add(handle.clone());
        self.metrics.connection_opened();

        info!(
            conn_id = %handle.id,
            user_id = %handle.user_id,
            total = self.pool.connection_count(),
            "Connection registered"
        );

        if first {
            self.presence.user_came_online(handle.user_id, handle.id);
        }
        self.spawn_eager_subscriptions(&handle);
    }

    /// Drop a connection from every index and close its queue.
    ///
    /// Runs on the control loop. Idempotent.
    pub(super) fn remove_connection(&self, conn_id: ConnectionId) -> bool {
        let Some((handle, last)) = self.pool.remove(&conn_id) else {
            return false;
        };

        handle.close();
        let conversations = self.conversations.remove_connection(conn_id);
        let watched = self.presence.remove_watcher(conn_id);
        self.metrics.connection_closed();

        if let Some(active) = handle.active_conversation() {
            self.notifier.notify_conversation(
                active,
                events::USER_INACTIVE_IN_CONVERSATION,
                builder::conversation_activity(active, handle.user_id),
                None,
            );
        }

        if last {
            self.presence.user_went_offline(handle.user_id);
        }

        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            conversations = conversations.len(),
            watched_users = watched,
            last_connection = last,
            "Connection unregistered"
        );
        true
    }

    /// Remove a connection whose queue rejected a frame.
    pub(super) fn evict(&self, conn_id: ConnectionId) {
        if self.remove_connection(conn_id) {
            self.metrics.connection_evicted();
        }
    }

    fn spawn_eager_subscriptions(self: &Arc<Self>, handle: &Arc<ConnectionHandle>) {
        let Some(service) = self.collaborators.conversations.clone() else {
            return;
        };
        let limit = self.config.eager_subscribe_limit;
        if limit == 0 {
            return;
        }

        let hub = Arc::clone(self);
        let conn_id = handle.id;
        let user_id = handle.user_id;

        tokio::spawn(async move {
            let page = service
                .get_user_conversations(
                    user_id,
                    u32::try_from(limit).unwrap_or(u32::MAX),
                    0,
                    ConversationOrder::RecentActivity,
                    false,
                )
                .await;

            match page {
                Ok(page) => {
                    let subscribed = page
                        .items
                        .iter()
                        .take(limit)
                        .filter(|conversation| hub.subscribe_conversation(conn_id, conversation.id))
                        .count();
                    debug!(
                        conn_id = %conn_id,
                        user_id = %user_id,
                        subscribed,
                        "Eager conversation subscriptions applied"
                    );
                }
                Err(e) => {
                    warn!(
                        conn_id = %conn_id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to load conversations for eager subscription"
                    );
                }
            }
        });
    }

    // ── Lookups ──────────────────────────────────────────────────

    /// Look up a registered connection.
    pub fn connection(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.pool.get(&conn_id)
    }

    /// Whether the connection is in the table.
    pub fn is_registered(&self, conn_id: ConnectionId) -> bool {
        self.pool.contains(&conn_id)
    }

    /// Whether the user has at least one live connection.
    pub fn is_user_online(&self, user_id: UserId) -> bool {
        self.pool.user_connection_count(&user_id) > 0
    }

    /// Connection IDs of a user.
    pub fn user_connections(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.pool.user_connection_ids(&user_id)
    }

    // ── Conversation subscriptions ───────────────────────────────

    /// Subscribe a registered connection to a conversation.
    ///
    /// Returns `false` if the connection is not registered, including when
    /// it is unregistered concurrently with this call.
    pub fn subscribe_conversation(&self, conn_id: ConnectionId, conversation_id: ConversationId) -> bool {
        if !self.pool.contains(&conn_id) {
            return false;
        }
        self.conversations.subscribe(conversation_id, conn_id);

        if !self.pool.contains(&conn_id) {
            self.conversations.unsubscribe(&conversation_id, conn_id);
            return false;
        }
        true
    }

    /// Returns `false` if the connection was not subscribed.
    pub fn unsubscribe_conversation(
        &self,
        conn_id: ConnectionId,
        conversation_id: ConversationId,
    ) -> bool {
        self.conversations.unsubscribe(&conversation_id, conn_id)
    }

    /// Subscribe every live connection of a user. Returns how many were added.
    pub fn subscribe_user_to_conversation(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> usize {
        self.pool
            .user_connection_ids(&user_id)
            .into_iter()
            .filter(|conn_id| self.subscribe_conversation(*conn_id, conversation_id))
            .count()
    }

    /// Whether any of the user's connections is subscribed to the conversation.
    pub fn user_subscribed_to(&self, user_id: UserId, conversation_id: ConversationId) -> bool {
        self.pool
            .user_connection_ids(&user_id)
            .into_iter()
            .any(|conn_id| self.conversations.is_subscribed(&conversation_id, conn_id))
    }

    /// Connections subscribed to a conversation.
    pub fn conversation_subscribers(&self, conversation_id: ConversationId) -> Vec<ConnectionId> {
        self.conversations.subscribers(&conversation_id)
    }

    /// Connections watching a user's status.
    pub fn user_status_subscribers(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.presence.watchers_of(user_id)
    }

    /// Membership gate for join-type commands.
    ///
    /// Passes when no conversation service is configured.
    pub async fn verify_membership(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> AppResult<()> {
        let Some(service) = self.collaborators.conversations.as_ref() else {
            return Ok(());
        };
        if service.check_membership(user_id, conversation_id).await? {
            Ok(())
        } else {
            Err(AppError::authorization(format!(
                "Not a member of conversation {conversation_id}"
            )))
        }
    }

    // ── Broadcast producers ──────────────────────────────────────

    /// Queue a broadcast for the control loop.
    pub fn notify(&self, message: BroadcastMessage) -> bool {
        self.notifier.notify(message)
    }

    /// Broadcast to a conversation's subscribers.
    pub fn notify_conversation(
        &self,
        conversation_id: ConversationId,
        event_type: &str,
        payload: Value,
        exclude: Option<ConnectionId>,
    ) -> bool {
        self.notifier
            .notify_conversation(conversation_id, event_type, payload, exclude)
    }

    /// Broadcast to every connection of one user.
    pub fn notify_user(&self, user_id: UserId, event_type: &str, payload: Value) -> bool {
        self.notifier.notify_user(user_id, event_type, payload)
    }

    /// Broadcast to every connection of several users.
    pub fn notify_users(&self, user_ids: Vec<UserId>, event_type: &str, payload: Value) -> bool {
        self.notifier.notify_users(user_ids, event_type, payload)
    }

    /// Broadcast to the given users of a business.
    pub fn notify_business(
        &self,
        business_id: BusinessId,
        user_ids: Vec<UserId>,
        event_type: &str,
        payload: Value,
    ) -> bool {
        self.notifier
            .notify_business(business_id, user_ids, event_type, payload)
    }

    // ── Direct delivery ──────────────────────────────────────────

    /// Send one frame to one connection, bypassing the broadcast queue.
    ///
    /// A full queue drops the frame without evicting. Returns whether the
    /// frame was queued.
    pub fn send_to_client(&self, conn_id: ConnectionId, frame: &OutboundFrame) -> bool {
        match encode_frame(frame) {
            Ok(bytes) => self.send_bytes(conn_id, bytes, &frame.frame_type),
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to encode frame");
                false
            }
        }
    }

    /// Encode once and send to several connections. Returns how many accepted it.
    pub fn send_to_clients(&self, conn_ids: &[ConnectionId], frame: &OutboundFrame) -> usize {
        if conn_ids.is_empty() {
            return 0;
        }
        let bytes = match encode_frame(frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(frame_type = %frame.frame_type, error = %e, "Failed to encode frame");
                return 0;
            }
        };
        conn_ids
            .iter()
            .filter(|conn_id| self.send_bytes(**conn_id, bytes.clone(), &frame.frame_type))
            .count()
    }

    fn send_bytes(&self, conn_id: ConnectionId, bytes: Bytes, frame_type: &str) -> bool {
        let Some(handle) = self.pool.get(&conn_id) else {
            debug!(conn_id = %conn_id, frame_type, "Target connection is not registered");
            return false;
        };

        match handle.try_send(bytes) {
            SendOutcome::Sent => {
                self.metrics.frames_delivered(1);
                true
            }
            SendOutcome::Full => {
                self.metrics.frame_dropped();
                warn!(conn_id = %conn_id, frame_type, "Send buffer full, frame dropped");
                false
            }
            SendOutcome::Closed => {
                debug!(conn_id = %conn_id, frame_type, "Send buffer closed, frame dropped");
                false
            }
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────

    /// Snapshot of hub statistics.
    pub fn stats(&self) -> HubStats {
        let now = Utc::now();
        HubStats {
            total_connections: self.pool.connection_count(),
            online_users: self.pool.user_count(),
            subscribed_conversations: self.conversations.key_count(),
            watched_users: self.presence.watched_count(),
            messages_sent: self.metrics.messages_sent(),
            active_typists: self.typing.active_count(),
            started_at: self.started_at,
            uptime_seconds: (now - self.started_at).num_seconds(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Diagnostic snapshot of every connection.
    pub fn all_connections(&self) -> Vec<ConnectionInfo> {
        self.pool
            .all_connections()
            .iter()
            .map(|handle| handle.info())
            .collect()
    }

    /// Users with at least one live connection.
    pub fn online_users(&self) -> Vec<UserId> {
        self.pool.online_user_ids()
    }
}

fn loop_stopped() -> AppError {
    AppError::service_unavailable("Hub control loop is not running")
}
