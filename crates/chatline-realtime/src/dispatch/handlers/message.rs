//! `send_message`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use chatline_core::error::{AppError, AppResult};
use chatline_core::traits::{ConversationMemberService, MessageNotice, NotificationService};
use chatline_core::types::ConversationKind;
use chatline_core::types::id::{ConversationId, MessageId, UserId};

use crate::connection::ConnectionHandle;
use crate::dispatch::handler::{CommandContext, CommandHandler};
use crate::hub::Hub;
use crate::message::builder::{self, ChatMessage};
use crate::message::validator::{MAX_CONTENT_CHARS, parse_payload, require_text};
use crate::message::{commands, events};

/// Characters of content carried in offline notices.
const PREVIEW_CHARS: usize = 120;

/// Members fetched per page when looking for offline recipients.
const MEMBER_PAGE_SIZE: u32 = 100;

const MAX_MESSAGE_TYPE_CHARS: usize = 32;

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    conversation_id: ConversationId,
    content: String,
    #[serde(default = "default_message_type")]
    message_type: String,
    #[serde(default)]
    client_message_id: Option<String>,
    #[serde(default)]
    reply_to: Option<MessageId>,
}

impl SendMessagePayload {
    fn check(&self) -> AppResult<()> {
        require_text("content", &self.content, MAX_CONTENT_CHARS)?;
        require_text("message_type", &self.message_type, MAX_MESSAGE_TYPE_CHARS)
    }
}

/// Accepts a chat message and fans it out to the conversation.
#[derive(Debug)]
pub struct SendMessageHandler {
    hub: Arc<Hub>,
}

impl SendMessageHandler {
    /// Create the handler.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Reject messages into a direct conversation where either side blocked the other.
    async fn check_direct_block(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
    ) -> AppResult<()> {
        let collaborators = self.hub.collaborators();
        let (Some(friendships), Some(members)) =
            (collaborators.friendships.as_ref(), collaborators.members.as_ref())
        else {
            return Ok(());
        };

        let page = members.get_members(sender_id, conversation_id, 1, 2).await?;
        let Some(other) = page.items.iter().find(|m| m.user_id != sender_id) else {
            return Ok(());
        };

        if friendships.check_block_status(sender_id, other.user_id).await?.any() {
            return Err(AppError::authorization(
                "Cannot send messages in this conversation",
            ));
        }
        Ok(())
    }

    /// Hand members without a live subscription to the notification service.
    fn spawn_offline_notices(&self, notice: MessageNotice) {
        let Some(notifications) = self.hub.notification_service() else {
            return;
        };
        let Some(members) = self.hub.collaborators().members.clone() else {
            return;
        };
        let hub = Arc::clone(&self.hub);

        tokio::spawn(async move {
            let recipients =
                match offline_recipients(&hub, members.as_ref(), &notice).await {
                    Ok(recipients) => recipients,
                    Err(e) => {
                        warn!(
                            conversation_id = %notice.conversation_id,
                            error = %e,
                            "Failed to resolve offline recipients"
                        );
                        return;
                    }
                };
            deliver_notices(notifications.as_ref(), &recipients, &notice).await;
        });
    }
}

async fn offline_recipients(
    hub: &Hub,
    members: &dyn ConversationMemberService,
    notice: &MessageNotice,
) -> AppResult<Vec<UserId>> {
    let mut recipients = Vec::new();
    let mut page = 1;
    let mut seen: u64 = 0;

    loop {
        let batch = members
            .get_members(notice.sender_id, notice.conversation_id, page, MEMBER_PAGE_SIZE)
            .await?;
        if batch.items.is_empty() {
            break;
        }
        seen += batch.items.len() as u64;
        recipients.extend(
            batch
                .items
                .iter()
                .map(|member| member.user_id)
                .filter(|user_id| *user_id != notice.sender_id)
                .filter(|user_id| !hub.user_subscribed_to(*user_id, notice.conversation_id)),
        );
        if seen >= batch.total {
            break;
        }
        page += 1;
    }
    Ok(recipients)
}

async fn deliver_notices(
    notifications: &dyn NotificationService,
    recipients: &[UserId],
    notice: &MessageNotice,
) {
    for recipient in recipients {
        if let Err(e) = notifications.notify_new_message(*recipient, notice).await {
            warn!(
                recipient_id = %recipient,
                message_id = %notice.message_id,
                error = %e,
                "Offline notification failed"
            );
        }
    }
    if !recipients.is_empty() {
        debug!(
            message_id = %notice.message_id,
            recipients = recipients.len(),
            "Offline notifications dispatched"
        );
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

#[async_trait]
impl CommandHandler for SendMessageHandler {
    fn command_type(&self) -> &'static str {
        commands::SEND_MESSAGE
    }

    fn validate(&self, payload: &Value) -> AppResult<()> {
        parse_payload::<SendMessagePayload>(payload)?.check()
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        conn: &Arc<ConnectionHandle>,
        payload: Value,
    ) -> AppResult<()> {
        let payload: SendMessagePayload = parse_payload(&payload)?;
        payload.check()?;

        let conversations = self.hub.collaborators().require_conversations()?;
        let conversation_id = payload.conversation_id;
        let sender_id = conn.user_id;

        if !conversations
            .check_membership(sender_id, conversation_id)
            .await?
        {
            return Err(AppError::authorization(format!(
                "Not a member of conversation {conversation_id}"
            )));
        }

        let summary = conversations.get_conversation(conversation_id).await?;
        if summary.kind == ConversationKind::Direct {
            self.check_direct_block(sender_id, conversation_id).await?;
        }

        let message = ChatMessage {
            message_id: MessageId::time_ordered(),
            conversation_id,
            sender_id,
            content: &payload.content,
            message_type: &payload.message_type,
            reply_to: payload.reply_to,
            client_message_id: payload.client_message_id.as_deref(),
            sent_at: Utc::now(),
        };

        self.hub.notify_conversation(
            conversation_id,
            events::NEW_MESSAGE,
            builder::new_message(&message),
            Some(conn.id),
        );
        self.hub.metrics().message_sent();
        self.hub
            .send_to_client(conn.id, &ctx.reply(events::MESSAGE_SENT, builder::message_sent(&message)));

        info!(
            message_id = %message.message_id,
            conversation_id = %conversation_id,
            sender_id = %sender_id,
            "Message sent"
        );

        self.spawn_offline_notices(MessageNotice {
            message_id: message.message_id,
            conversation_id,
            sender_id,
            preview: preview(&payload.content),
            sent_at: message.sent_at,
        });
        Ok(())
    }
}
