//! Command handler trait and per-command context.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use chatline_core::error::AppResult;

use crate::connection::ConnectionHandle;
use crate::message::{InboundCommand, OutboundFrame};

/// Metadata of the command being handled.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Type tag of the command.
    pub command_type: String,
    /// Correlation ID to echo in the response.
    pub request_id: Option<String>,
    /// Client-supplied timestamp, milliseconds.
    pub client_timestamp: Option<i64>,
    /// When the hub received the command.
    pub received_at: DateTime<Utc>,
}

impl CommandContext {
    /// Build the context for an inbound command.
    pub fn from_command(command: &InboundCommand) -> Self {
        Self {
            command_type: command.command_type.clone(),
            request_id: command.request_id.clone(),
            client_timestamp: command.timestamp,
            received_at: Utc::now(),
        }
    }

    /// Successful response frame carrying this command's request ID.
    pub fn reply(&self, frame_type: &str, data: Value) -> OutboundFrame {
        OutboundFrame::response(frame_type, self.request_id.clone(), data)
    }
}

/// Handler for one command type.
#[async_trait]
pub trait CommandHandler: Send + Sync + std::fmt::Debug {
    /// Type tag this handler serves.
    fn command_type(&self) -> &'static str;

    /// Check the payload shape before any side effect.
    fn validate(&self, _payload: &Value) -> AppResult<()> {
        Ok(())
    }

    /// Execute the command. Responses are sent through the hub.
    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()>;
}
