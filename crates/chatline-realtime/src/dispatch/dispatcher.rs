//! Routes inbound commands to their handlers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use chatline_core::error::{AppError, AppResult, ErrorKind};

use super::handler::{CommandContext, CommandHandler};
use super::handlers;
use crate::connection::ConnectionHandle;
use crate::hub::Hub;
use crate::message::serializer::decode_command;
use crate::message::validator::validate_raw;
use crate::message::{InboundCommand, OutboundFrame, commands};

/// Registry from command type tag to handler.
#[derive(Debug)]
pub struct CommandDispatcher {
    hub: Arc<Hub>,
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    /// Dispatcher with every built-in command registered.
    pub fn new(hub: Arc<Hub>) -> Self {
        let mut dispatcher = Self::empty(hub.clone());
        for handler in handlers::builtin(&hub) {
            dispatcher.register(handler);
        }
        info!(
            commands = dispatcher.handlers.len(),
            "Command dispatcher initialized"
        );
        dispatcher
    }

    /// Dispatcher with no handlers.
    pub fn empty(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the same tag.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let command_type = handler.command_type();
        if self.handlers.insert(command_type, handler).is_some() {
            warn!(command_type, "Command handler replaced");
        }
    }

    /// Whether a handler is registered for the tag.
    pub fn has_handler(&self, command_type: &str) -> bool {
        self.handlers.contains_key(command_type)
    }

    /// Registered command tags, sorted.
    pub fn command_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decode and dispatch one text frame from a client.
    ///
    /// Failures are reported to the client as an error frame before being
    /// returned; the connection stays open either way.
    pub async fn dispatch_raw(&self, conn: &Arc<ConnectionHandle>, raw: &str) -> AppResult<()> {
        let decoded = validate_raw(raw, self.hub.config().max_message_size)
            .and_then(|()| {
                decode_command(raw)
                    .map_err(|e| AppError::validation(format!("Malformed command: {}", e.message)))
            });

        match decoded {
            Ok(command) => self.dispatch(conn, command).await,
            Err(e) => {
                self.hub.metrics().command_received();
                self.report_failure(conn, "unknown", None, &e);
                Err(e)
            }
        }
    }

    /// Dispatch a decoded command.
    pub async fn dispatch(
        &self,
        conn: &Arc<ConnectionHandle>,
        command: InboundCommand,
    ) -> AppResult<()> {
        self.hub.metrics().command_received();
        let ctx = CommandContext::from_command(&command);

        trace!(
            conn_id = %conn.id,
            command_type = %ctx.command_type,
            "Dispatching command"
        );

        let result = self.execute(&ctx, conn, command.data).await;
        if let Err(ref e) = result {
            self.report_failure(conn, &ctx.command_type, ctx.request_id.clone(), e);
        }
        result
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let Some(handler) = self.handlers.get(ctx.command_type.as_str()) else {
            return Err(AppError::not_found(format!(
                "Unknown command type: {}",
                ctx.command_type
            )));
        };

        if ctx.command_type != commands::PING && !conn.admit_command() {
            if is_typing_command(&ctx.command_type) {
                trace!(conn_id = %conn.id, "Typing command dropped by rate limit");
                return Ok(());
            }
            return Err(AppError::rate_limited("Too many commands, slow down"));
        }

        handler.validate(&payload)?;
        handler.handle(ctx, conn, payload).await
    }

    fn report_failure(
        &self,
        conn: &Arc<ConnectionHandle>,
        command_type: &str,
        request_id: Option<String>,
        err: &AppError,
    ) {
        self.hub.metrics().command_failed();

        match err.kind {
            ErrorKind::Internal | ErrorKind::ExternalService | ErrorKind::Serialization => {
                warn!(conn_id = %conn.id, command_type, error = %err, "Command failed");
            }
            _ => {
                debug!(conn_id = %conn.id, command_type, error = %err, "Command rejected");
            }
        }

        // Typing is fire-and-forget; clients never get an error for it.
        if is_typing_command(command_type) {
            return;
        }
        let frame = OutboundFrame::failure(command_type, request_id, err);
        self.hub.send_to_client(conn.id, &frame);
    }
}

fn is_typing_command(command_type: &str) -> bool {
    command_type == commands::TYPING_START || command_type == commands::TYPING_STOP
}
