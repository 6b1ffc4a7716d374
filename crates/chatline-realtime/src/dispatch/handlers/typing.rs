//! `typing_start` / `typing_stop`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use chatline_core::error::AppResult;
use chatline_core::types::id::ConversationId;

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::commands;
use crate::message::validator::parse_payload;

#[derive(Debug, Deserialize)]
struct TypingPayload {
    conversation_id: ConversationId,
}

/// Starts (or refreshes) the caller's typing indicator.
#[derive(Debug)]
pub struct TypingStartHandler {
    hub: Arc<Hub>,
}

impl TypingStartHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for TypingStartHandler {
    fn command_type(&self) -> &'static str {
        commands::TYPING_START
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<TypingPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        _ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: TypingPayload = parse_payload(&payload)?;
        // Outsiders never reach the conversation; the dispatcher keeps the
        // failure off the wire.
        self.hub
            .verify_membership(conn.user_id, payload.conversation_id)
            .await?;
        self.hub
            .typing()
            .start(payload.conversation_id, conn.user_id, Some(conn.id))
            .await;
        Ok(())
    }
}

/// Clears the caller's typing indicator.
#[derive(Debug)]
pub struct TypingStopHandler {
    hub: Arc<Hub>,
}

impl TypingStopHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for TypingStopHandler {
    fn command_type(&self) -> &'static str {
        commands::TYPING_STOP
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<TypingPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        _ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: TypingPayload = parse_payload(&payload)?;
        self.hub
            .typing()
            .stop(payload.conversation_id, conn.user_id, Some(conn.id));
        Ok(())
    }
}
