//! Non-blocking producer side of the broadcast queue.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use chatline_core::types::id::{BusinessId, ConnectionId, ConversationId, UserId};

use super::envelope::BroadcastMessage;
use crate::metrics::RealtimeMetrics;

/// Cloneable handle for queueing broadcasts.
///
/// Producers never wait: when the queue is at capacity the envelope is
/// discarded and counted.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<BroadcastMessage>,
    metrics: Arc<RealtimeMetrics>,
}

impl Notifier {
    /// Create a notifier over the broadcast queue.
    pub(crate) fn new(tx: mpsc::Sender<BroadcastMessage>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self { tx, metrics }
    }

    /// Queue a broadcast. Returns `false` if it was dropped.
    pub fn notify(&self, message: BroadcastMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics.broadcast_queued();
                true
            }
            Err(TrySendError::Full(message)) => {
                self.metrics.broadcast_dropped();
                warn!(
                    event_type = %message.event_type,
                    "Broadcast queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(message)) => {
                debug!(
                    event_type = %message.event_type,
                    "Hub is stopped, dropping event"
                );
                false
            }
        }
    }

    /// Queue an event for a conversation's subscribers.
    pub fn notify_conversation(
        &self,
        conversation_id: ConversationId,
        event_type: &str,
        payload: Value,
        exclude: Option<ConnectionId>,
    ) -> bool {
        self.notify(
            BroadcastMessage::to_conversation(conversation_id, event_type, payload).excluding(exclude),
        )
    }

    /// Queue an event for all connections of one user.
    pub fn notify_user(&self, user_id: UserId, event_type: &str, payload: Value) -> bool {
        self.notify(BroadcastMessage::to_user(user_id, event_type, payload))
    }

    /// Queue an event for all connections of several users.
    pub fn notify_users(&self, user_ids: Vec<UserId>, event_type: &str, payload: Value) -> bool {
        if user_ids.is_empty() {
            return false;
        }
        self.notify(BroadcastMessage::to_users(user_ids, event_type, payload))
    }

    /// Queue a business-scoped event.
    pub fn notify_business(
        &self,
        business_id: BusinessId,
        user_ids: Vec<UserId>,
        event_type: &str,
        payload: Value,
    ) -> bool {
        self.notify(BroadcastMessage::to_business(
            business_id,
            user_ids,
            event_type,
            payload,
        ))
    }
}
