//! `ping`: heartbeat refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use chatline_core::error::AppResult;

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::{commands, events};

/// Refreshes the connection's heartbeat and answers `pong`.
#[derive(Debug)]
pub struct PingHandler {
    hub: Arc<Hub>,
}

impl PingHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CommandHandler for PingHandler {
    fn command_type(&self) -> &'static str {
        commands::PING
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        _payload: Value,
    ) -> AppResult<()> {
        conn.touch();
        let data = json!({
            "server_time": Utc::now(),
            "client_timestamp": ctx.client_timestamp,
        });
        self.hub.send_to_client(conn.id, &ctx.reply(events::PONG, data));
        Ok(())
    }
}
