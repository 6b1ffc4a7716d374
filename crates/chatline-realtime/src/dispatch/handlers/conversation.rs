//! `join_conversation`, `leave_conversation` and `set_active_conversation`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use chatline_core::error::AppResult;
use chatline_core::types::id::{ConnectionId, ConversationId, UserId};

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::validator::parse_payload;
use crate::message::{builder, commands, events};

#[derive(Debug, Deserialize)]
struct ConversationPayload {
    conversation_id: ConversationId,
}

#[derive(Debug, Deserialize)]
struct ActiveConversationPayload {
    #[serde(default)]
    conversation_id: Option<ConversationId>,
}

fn announce_active(hub: &Hub, conversation_id: ConversationId, user_id: UserId, origin: ConnectionId) {
    hub.notify_conversation(
        conversation_id,
        events::USER_ACTIVE_IN_CONVERSATION,
        builder::conversation_activity(conversation_id, user_id),
        Some(origin),
    );
}

fn announce_inactive(hub: &Hub, conversation_id: ConversationId, user_id: UserId, origin: ConnectionId) {
    hub.notify_conversation(
        conversation_id,
        events::USER_INACTIVE_IN_CONVERSATION,
        builder::conversation_activity(conversation_id, user_id),
        Some(origin),
    );
}

/// Subscribes the connection to a conversation's events.
#[derive(Debug)]
pub struct JoinConversationHandler {
    hub: Arc<Hub>,
}

impl JoinConversationHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for JoinConversationHandler {
    fn command_type(&self) -> &'static str {
        commands::JOIN_CONVERSATION
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<ConversationPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let ConversationPayload { conversation_id } = parse_payload(&payload)?;
        self.hub.verify_membership(conn.user_id, conversation_id).await?;

        let subscribed = self.hub.subscribe_conversation(conn.id, conversation_id);
        debug!(
            conn_id = %conn.id,
            conversation_id = %conversation_id,
            subscribed,
            "Joined conversation"
        );

        let data = json!({ "conversation_id": conversation_id });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::CONVERSATION_JOINED, data));
        Ok(())
    }
}

/// Unsubscribes the connection from a conversation.
#[derive(Debug)]
pub struct LeaveConversationHandler {
    hub: Arc<Hub>,
}

impl LeaveConversationHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for LeaveConversationHandler {
    fn command_type(&self) -> &'static str {
        commands::LEAVE_CONVERSATION
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<ConversationPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let ConversationPayload { conversation_id } = parse_payload(&payload)?;
        self.hub.verify_membership(conn.user_id, conversation_id).await?;

        let was_subscribed = self.hub.unsubscribe_conversation(conn.id, conversation_id);
        if conn.clear_active_conversation_if(conversation_id) {
            announce_inactive(&self.hub, conversation_id, conn.user_id, conn.id);
        }

        let data = json!({
            "conversation_id": conversation_id,
            "was_subscribed": was_subscribed,
        });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::CONVERSATION_LEFT, data));
        Ok(())
    }
}

/// Sets or clears the conversation the user has on screen.
#[derive(Debug)]
pub struct SetActiveConversationHandler {
    hub: Arc<Hub>,
}

impl SetActiveConversationHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for SetActiveConversationHandler {
    fn command_type(&self) -> &'static str {
        commands::SET_ACTIVE_CONVERSATION
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<ActiveConversationPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let ActiveConversationPayload { conversation_id } = parse_payload(&payload)?;

        if let Some(conversation_id) = conversation_id {
            self.hub.verify_membership(conn.user_id, conversation_id).await?;
            self.hub.subscribe_conversation(conn.id, conversation_id);
        }

        let previous = conn.set_active_conversation(conversation_id);
        if previous != conversation_id {
            if let Some(previous) = previous {
                announce_inactive(&self.hub, previous, conn.user_id, conn.id);
            }
            if let Some(current) = conversation_id {
                announce_active(&self.hub, current, conn.user_id, conn.id);
            }
        }

        let data = json!({
            "conversation_id": conversation_id,
            "previous_conversation_id": previous,
        });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::ACTIVE_CONVERSATION_SET, data));
        Ok(())
    }
}
