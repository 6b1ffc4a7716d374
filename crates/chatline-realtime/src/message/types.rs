//! Inbound command and outbound frame definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatline_core::error::AppError;

/// Command type tags accepted from clients.
pub mod commands {
    /// Heartbeat.
    pub const PING: &str = "ping";
    /// Send a chat message.
    pub const SEND_MESSAGE: &str = "send_message";
    /// User started typing.
    pub const TYPING_START: &str = "typing_start";
    /// User stopped typing.
    pub const TYPING_STOP: &str = "typing_stop";
    /// Subscribe to a conversation's events.
    pub const JOIN_CONVERSATION: &str = "join_conversation";
    /// Unsubscribe from a conversation's events.
    pub const LEAVE_CONVERSATION: &str = "leave_conversation";
    /// Set or clear the conversation on screen.
    pub const SET_ACTIVE_CONVERSATION: &str = "set_active_conversation";
    /// Watch a user's presence.
    pub const SUBSCRIBE_USER_STATUS: &str = "subscribe_user_status";
    /// Stop watching a user's presence.
    pub const UNSUBSCRIBE_USER_STATUS: &str = "unsubscribe_user_status";
    /// List own conversations.
    pub const GET_CONVERSATIONS: &str = "get_conversations";
    /// List members of a conversation.
    pub const GET_CONVERSATION_MEMBERS: &str = "get_conversation_members";
    /// Open a one-to-one conversation.
    pub const CREATE_DIRECT_CONVERSATION: &str = "create_direct_conversation";
    /// Create a group conversation.
    pub const CREATE_GROUP_CONVERSATION: &str = "create_group_conversation";
}

/// Frame type tags sent to clients.
pub mod events {
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const MESSAGE_SENT: &str = "message_sent";
    pub const TYPING_STARTED: &str = "typing_started";
    pub const TYPING_STOPPED: &str = "typing_stopped";
    /// Per-user typing event kept for older clients.
    pub const USER_TYPING: &str = "user_typing";
    pub const CONVERSATION_JOINED: &str = "conversation_joined";
    pub const CONVERSATION_LEFT: &str = "conversation_left";
    pub const ACTIVE_CONVERSATION_SET: &str = "active_conversation_set";
    pub const USER_ACTIVE_IN_CONVERSATION: &str = "user_active_in_conversation";
    pub const USER_INACTIVE_IN_CONVERSATION: &str = "user_inactive_in_conversation";
    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";
    pub const USER_STATUS: &str = "user_status";
    pub const USER_STATUS_UNSUBSCRIBED: &str = "user_status_unsubscribed";
    pub const CONVERSATIONS: &str = "conversations";
    pub const CONVERSATION_MEMBERS: &str = "conversation_members";
    pub const CONVERSATION_CREATED: &str = "conversation_created";
}

/// A decoded command from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundCommand {
    /// Command type tag.
    #[serde(rename = "type")]
    pub command_type: String,
    /// Command payload; shape depends on the type.
    #[serde(default)]
    pub data: Value,
    /// Client timestamp in milliseconds, if sent.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Correlation ID echoed back in responses.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl InboundCommand {
    /// Build a command (mostly useful in tests and server-side replays).
    pub fn new(command_type: &str, data: Value) -> Self {
        Self {
            command_type: command_type.to_string(),
            data,
            timestamp: None,
            request_id: None,
        }
    }

    /// Attach a request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A frame sent to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Frame type tag.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Frame payload.
    pub data: Value,
    /// Server time.
    pub timestamp: DateTime<Utc>,
    /// Request ID of the command this frame answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Whether the answered command succeeded; `true` for pushed events.
    pub success: bool,
    /// Error message when `success` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboundFrame {
    /// Pushed event not tied to a request.
    pub fn event(frame_type: &str, data: Value) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            data,
            timestamp: Utc::now(),
            request_id: None,
            success: true,
            error: None,
        }
    }

    /// Successful answer to a command.
    pub fn response(frame_type: &str, request_id: Option<String>, data: Value) -> Self {
        Self {
            request_id,
            ..Self::event(frame_type, data)
        }
    }

    /// Failed answer to a command.
    pub fn failure(command_type: &str, request_id: Option<String>, err: &AppError) -> Self {
        Self {
            frame_type: events::ERROR.to_string(),
            data: serde_json::json!({
                "command": command_type,
                "code": err.code(),
            }),
            timestamp: Utc::now(),
            request_id,
            success: false,
            error: Some(err.message.clone()),
        }
    }
}
