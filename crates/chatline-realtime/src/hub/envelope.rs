//! Broadcast envelope queued for the hub control loop.

use serde_json::Value;

use chatline_core::types::id::{BusinessId, ConnectionId, ConversationId, UserId};

/// Who a broadcast is for.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastTarget {
    /// Every connection of each listed user.
    Users(Vec<UserId>),
    /// Every connection subscribed to the conversation.
    Conversation(ConversationId),
    /// A business-wide event, fanned out to the listed users' connections.
    Business {
        /// Business the event belongs to.
        business_id: BusinessId,
        /// Recipients.
        user_ids: Vec<UserId>,
    },
}

/// One logical event to fan out.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// Frame type tag.
    pub event_type: String,
    /// Frame payload.
    pub payload: Value,
    /// Primary fan-out set.
    pub target: BroadcastTarget,
    /// Connection to leave out, typically the one whose command caused the event.
    pub exclude: Option<ConnectionId>,
}

impl BroadcastMessage {
    fn new(event_type: &str, payload: Value, target: BroadcastTarget) -> Self {
        Self {
            event_type: event_type.to_string(),
            payload,
            target,
            exclude: None,
        }
    }

    /// Event for a conversation's subscribers.
    pub fn to_conversation(conversation_id: ConversationId, event_type: &str, payload: Value) -> Self {
        Self::new(event_type, payload, BroadcastTarget::Conversation(conversation_id))
    }

    /// Event for a set of users.
    pub fn to_users(user_ids: Vec<UserId>, event_type: &str, payload: Value) -> Self {
        Self::new(event_type, payload, BroadcastTarget::Users(user_ids))
    }

    /// Event for one user.
    pub fn to_user(user_id: UserId, event_type: &str, payload: Value) -> Self {
        Self::to_users(vec![user_id], event_type, payload)
    }

    /// Business event for the given members.
    pub fn to_business(
        business_id: BusinessId,
        user_ids: Vec<UserId>,
        event_type: &str,
        payload: Value,
    ) -> Self {
        Self::new(
            event_type,
            payload,
            BroadcastTarget::Business {
                business_id,
                user_ids,
            },
        )
    }

    /// Skip `conn_id` when delivering.
    pub fn excluding(mut self, conn_id: impl Into<Option<ConnectionId>>) -> Self {
        self.exclude = conn_id.into();
        self
    }
}
