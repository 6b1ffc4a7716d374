//! Builders for event payloads shared by several handlers.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use chatline_core::types::id::{ConversationId, MessageId, UserId};

/// A chat message as fanned out to conversation subscribers.
#[derive(Debug, Clone)]
pub struct ChatMessage<'a> {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: &'a str,
    pub message_type: &'a str,
    pub reply_to: Option<MessageId>,
    pub client_message_id: Option<&'a str>,
    pub sent_at: DateTime<Utc>,
}

/// `new_message` payload.
pub fn new_message(msg: &ChatMessage<'_>) -> Value {
    json!({
        "message_id": msg.message_id,
        "conversation_id": msg.conversation_id,
        "sender_id": msg.sender_id,
        "content": msg.content,
        "message_type": msg.message_type,
        "reply_to": msg.reply_to,
        "client_message_id": msg.client_message_id,
        "sent_at": msg.sent_at,
    })
}

/// `message_sent` acknowledgement payload.
pub fn message_sent(msg: &ChatMessage<'_>) -> Value {
    json!({
        "message_id": msg.message_id,
        "conversation_id": msg.conversation_id,
        "client_message_id": msg.client_message_id,
        "sent_at": msg.sent_at,
    })
}

/// `typing_started` payload.
pub fn typing_started(conversation_id: ConversationId, user_id: UserId, display_name: &str) -> Value {
    json!({
        "conversation_id": conversation_id,
        "user_id": user_id,
        "display_name": display_name,
    })
}

/// `typing_stopped` payload.
pub fn typing_stopped(conversation_id: ConversationId, user_id: UserId) -> Value {
    json!({
        "conversation_id": conversation_id,
        "user_id": user_id,
    })
}

/// Legacy `user_typing` payload.
pub fn user_typing(
    conversation_id: ConversationId,
    user_id: UserId,
    display_name: Option<&str>,
    is_typing: bool,
) -> Value {
    json!({
        "conversation_id": conversation_id,
        "user_id": user_id,
        "username": display_name,
        "is_typing": is_typing,
    })
}

/// Payload of `user_active_in_conversation` / `user_inactive_in_conversation`.
pub fn conversation_activity(conversation_id: ConversationId, user_id: UserId) -> Value {
    json!({
        "conversation_id": conversation_id,
        "user_id": user_id,
        "at": Utc::now(),
    })
}
