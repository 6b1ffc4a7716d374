//! `create_direct_conversation` / `create_group_conversation`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use chatline_core::error::{AppError, AppResult};
use chatline_core::types::ConversationSummary;
use chatline_core::types::id::UserId;

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::validator::{MAX_GROUP_MEMBERS, MAX_GROUP_NAME_CHARS, parse_payload, require_text};
use crate::message::{commands, events};

#[derive(Debug, Deserialize)]
struct DirectPayload {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    name: String,
    member_ids: Vec<UserId>,
}

impl GroupPayload {
    fn check(&self) -> AppResult<()> {
        require_text("name", &self.name, MAX_GROUP_NAME_CHARS)?;
        if self.member_ids.is_empty() {
            return Err(AppError::validation("member_ids must not be empty"));
        }
        if self.member_ids.len() > MAX_GROUP_MEMBERS {
            return Err(AppError::validation(format!(
                "A group can be created with at most {MAX_GROUP_MEMBERS} members"
            )));
        }
        Ok(())
    }
}

/// Subscribe the creator, acknowledge, and tell the other participants.
fn publish_created(
    hub: &Hub,
    ctx: &CommandContext,
    conn: &ConnectionHandle,
    conversation: &ConversationSummary,
    participants: Vec<UserId>,
) {
    hub.subscribe_user_to_conversation(conn.user_id, conversation.id);

    let data = json!({
        "conversation": conversation,
        "created_by": conn.user_id,
    });
    hub.send_to_client(conn.id, &ctx.reply(events::CONVERSATION_CREATED, data.clone()));
    hub.notify_users(participants, events::CONVERSATION_CREATED, data);

    info!(
        conversation_id = %conversation.id,
        kind = ?conversation.kind,
        created_by = %conn.user_id,
        "Conversation created"
    );
}

/// Opens a one-to-one conversation.
#[derive(Debug)]
pub struct CreateDirectConversationHandler {
    hub: Arc<Hub>,
}

impl CreateDirectConversationHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for CreateDirectConversationHandler {
    fn command_type(&self) -> &'static str {
        commands::CREATE_DIRECT_CONVERSATION
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<DirectPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let DirectPayload { user_id: other } = parse_payload(&payload)?;
        if other == conn.user_id {
            return Err(AppError::validation(
                "Cannot create a direct conversation with yourself",
            ));
        }

        let collaborators = self.hub.collaborators();
        let service = collaborators.require_conversations()?;

        if let Some(friendships) = collaborators.friendships.as_ref() {
            if friendships.check_block_status(conn.user_id, other).await?.any() {
                return Err(AppError::authorization(
                    "Cannot create a conversation with this user",
                ));
            }
        }

        let conversation = service.create_direct_conversation(conn.user_id, other).await?;
        publish_created(&self.hub, ctx, conn, &conversation, vec![other]);
        Ok(())
    }
}

/// Creates a named group conversation.
#[derive(Debug)]
pub struct CreateGroupConversationHandler {
    hub: Arc<Hub>,
}

impl CreateGroupConversationHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for CreateGroupConversationHandler {
    fn command_type(&self) -> &'static str {
        commands::CREATE_GROUP_CONVERSATION
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<GroupPayload>(payload)?.check()
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: GroupPayload = parse_payload(&payload)?;
        payload.check()?;
        let service = self.hub.collaborators().require_conversations()?;

        let mut seen = HashSet::new();
        let members: Vec<UserId> = payload
            .member_ids
            .into_iter()
            .filter(|id| *id != conn.user_id && seen.insert(*id))
            .collect();
        if members.is_empty() {
            return Err(AppError::validation(
                "A group needs at least one member besides the creator",
            ));
        }

        let name = payload.name.trim();
        let conversation = service
            .create_group_conversation(conn.user_id, name, &members)
            .await?;
        publish_created(&self.hub, ctx, conn, &conversation, members);
        Ok(())
    }
}
