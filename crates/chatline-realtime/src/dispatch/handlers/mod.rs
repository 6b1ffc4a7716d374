//! Built-in command handlers.

pub mod conversation;
pub mod create;
pub mod listing;
pub mod message;
pub mod ping;
pub mod presence;
pub mod typing;

use std::sync::Arc;

use super::handler::CommandHandler;
use crate::hub::Hub;

/// One instance of every built-in handler.
pub fn builtin(hub: &Arc<Hub>) -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(ping::PingHandler::new(hub.clone())),
        Arc::new(message::SendMessageHandler::new(hub.clone())),
        Arc::new(typing::TypingStartHandler::new(hub.clone())),
        Arc::new(typing::TypingStopHandler::new(hub.clone())),
        Arc::new(conversation::JoinConversationHandler::new(hub.clone())),
        Arc::new(conversation::LeaveConversationHandler::new(hub.clone())),
        Arc::new(conversation::SetActiveConversationHandler::new(hub.clone())),
        Arc::new(presence::SubscribeUserStatusHandler::new(hub.clone())),
        Arc::new(presence::UnsubscribeUserStatusHandler::new(hub.clone())),
        Arc::new(listing::GetConversationsHandler::new(hub.clone())),
        Arc::new(listing::GetConversationMembersHandler::new(hub.clone())),
        Arc::new(create::CreateDirectConversationHandler::new(hub.clone())),
        Arc::new(create::CreateGroupConversationHandler::new(hub.clone())),
    ]
}
