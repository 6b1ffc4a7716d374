//! Presence persistence and out-of-band notification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::types::id::{ConversationId, MessageId, UserId};

/// External store mirroring which users are online (e.g. a cache shared
/// with the REST layer).
#[async_trait]
pub trait PresenceStore: Send + Sync + 'static {
    /// Record that the user has at least one live connection.
    async fn set_user_online(&self, user_id: UserId) -> AppResult<()>;

    /// Record that the user's last connection went away.
    async fn set_user_offline(&self, user_id: UserId) -> AppResult<()>;
}

/// Summary of a message for recipients who are not watching the
/// conversation live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageNotice {
    /// Message ID.
    pub message_id: MessageId,
    /// Conversation the message was sent to.
    pub conversation_id: ConversationId,
    /// Sender.
    pub sender_id: UserId,
    /// Truncated message body.
    pub preview: String,
    /// When the hub accepted the message.
    pub sent_at: DateTime<Utc>,
}

/// Push/in-app notification delivery for users without a live
/// subscription to the conversation.
#[async_trait]
pub trait NotificationService: Send + Sync + 'static {
    /// Notify `recipient_id` of a new message.
    async fn notify_new_message(&self, recipient_id: UserId, notice: &MessageNotice)
    -> AppResult<()>;
}
