//! `subscribe_user_status` / `unsubscribe_user_status`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use chatline_core::error::{AppError, AppResult};
use chatline_core::types::id::UserId;

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::validator::parse_payload;
use crate::message::{commands, events};

#[derive(Debug, Deserialize)]
struct UserStatusPayload {
    user_id: UserId,
}

/// Starts watching a user and answers with their current status.
#[derive(Debug)]
pub struct SubscribeUserStatusHandler {
    hub: Arc<Hub>,
}

impl SubscribeUserStatusHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for SubscribeUserStatusHandler {
    fn command_type(&self) -> &'static str {
        commands::SUBSCRIBE_USER_STATUS
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<UserStatusPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: UserStatusPayload = parse_payload(&payload)?;
        let status = self
            .hub
            .presence()
            .subscribe(&self.hub, conn.id, payload.user_id)
            .ok_or_else(|| AppError::not_found("Connection is no longer registered"))?;

        let data = serde_json::to_value(&status)?;
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::USER_STATUS, data));
        Ok(())
    }
}

#[derive(Debug)]
pub struct UnsubscribeUserStatusHandler {
    hub: Arc<Hub>,
}

impl UnsubscribeUserStatusHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for UnsubscribeUserStatusHandler {
    fn command_type(&self) -> &'static str {
        commands::UNSUBSCRIBE_USER_STATUS
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<UserStatusPayload>(payload).map(|_| ())
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: UserStatusPayload = parse_payload(&payload)?;
        let was_subscribed = self.hub.presence().unsubscribe(conn.id, payload.user_id);

        let data = json!({
            "user_id": payload.user_id,
            "was_subscribed": was_subscribed,
        });
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::USER_STATUS_UNSUBSCRIBED, data));
        Ok(())
    }
}
