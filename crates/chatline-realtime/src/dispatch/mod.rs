//! Command dispatch from inbound client frames to handlers.

pub mod dispatcher;
pub mod handler;
pub mod handlers;

pub use dispatcher::CommandDispatcher;
pub use handler::{CommandContext, CommandHandler};
