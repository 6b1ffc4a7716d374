//! `get_conversations` / `get_conversation_members`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use chatline_core::error::{AppError, AppResult};
use chatline_core::types::ConversationOrder;
use chatline_core::types::id::ConversationId;

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::validator::parse_payload;
use crate::message::{commands, events};

const DEFAULT_CONVERSATION_LIMIT: u32 = 20;
const MAX_CONVERSATION_LIMIT: u32 = 100;
const DEFAULT_MEMBER_PAGE_SIZE: u32 = 50;
const MAX_MEMBER_PAGE_SIZE: u32 = 200;

fn default_conversation_limit() -> u32 {
    DEFAULT_CONVERSATION_LIMIT
}

fn default_page() -> u32 {
    1
}

fn default_member_page_size() -> u32 {
    DEFAULT_MEMBER_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
struct ConversationsQuery {
    #[serde(default = "default_conversation_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    order: ConversationOrder,
    #[serde(default)]
    include_archived: bool,
}

impl ConversationsQuery {
    fn check(&self) -> AppResult<()> {
        if self.limit == 0 || self.limit > MAX_CONVERSATION_LIMIT {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_CONVERSATION_LIMIT}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MembersQuery {
    conversation_id: ConversationId,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_member_page_size")]
    page_size: u32,
}

impl MembersQuery {
    fn check(&self) -> AppResult<()> {
        if self.page == 0 {
            return Err(AppError::validation("page starts at 1"));
        }
        if self.page_size == 0 || self.page_size > MAX_MEMBER_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "page_size must be between 1 and {MAX_MEMBER_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Lists the caller's conversations.
#[derive(Debug)]
pub struct GetConversationsHandler {
    hub: Arc<Hub>,
}

impl GetConversationsHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for GetConversationsHandler {
    fn command_type(&self) -> &'static str {
        commands::GET_CONVERSATIONS
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<ConversationsQuery>(payload)?.check()
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let query: ConversationsQuery = parse_payload(&payload)?;
        let service = self.hub.collaborators().require_conversations()?;

        let page = service
            .get_user_conversations(
                conn.user_id,
                query.limit,
                query.offset,
                query.order,
                query.include_archived,
            )
            .await?;

        let data = json!({
            "items": page.items,
            "total": page.total,
            "limit": query.limit,
            "offset": query.offset,
        });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::CONVERSATIONS, data));
        Ok(())
    }
}

/// Lists members of a conversation the caller belongs to.
#[derive(Debug)]
pub struct GetConversationMembersHandler {
    hub: Arc<Hub>,
}

impl GetConversationMembersHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for GetConversationMembersHandler {
    fn command_type(&self) -> &'static str {
        commands::GET_CONVERSATION_MEMBERS
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<MembersQuery>(payload)?.check()
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let query: MembersQuery = parse_payload(&payload)?;
        let service = self.hub.collaborators().require_members()?;

        let page = service
            .get_members(conn.user_id, query.conversation_id, query.page, query.page_size)
            .await?;

        let data = json!({
            "conversation_id": query.conversation_id,
            "items": page.items,
            "total": page.total,
            "page": query.page,
            "page_size": query.page_size,
        });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::CONVERSATION_MEMBERS, data));
        Ok(())
    }
}
