//! Conversation collaborators consumed by the hub.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::types::conversation::{
    ConversationOrder, ConversationPage, ConversationSummary, MemberPage,
};
use crate::types::id::{ConversationId, UserId};

/// Conversation persistence and membership.
///
/// The hub never stores conversations itself; it asks this service
/// whether a user may see a conversation and which conversations to
/// subscribe a fresh connection to.
#[async_trait]
pub trait ConversationService: Send + Sync + 'static {
    /// Whether `user_id` is a member of `conversation_id`.
    async fn check_membership(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> AppResult<bool>;

    /// Look up a single conversation.
    async fn get_conversation(&self, conversation_id: ConversationId)
    -> AppResult<ConversationSummary>;

    /// List a user's conversations.
    async fn get_user_conversations(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
        order: ConversationOrder,
        include_archived: bool,
    ) -> AppResult<ConversationPage>;

    /// Create (or return the existing) direct conversation between two users.
    async fn create_direct_conversation(
        &self,
        creator_id: UserId,
        other_user_id: UserId,
    ) -> AppResult<ConversationSummary>;

    /// Create a group conversation. `member_ids` excludes the creator.
    async fn create_group_conversation(
        &self,
        creator_id: UserId,
        name: &str,
        member_ids: &[UserId],
    ) -> AppResult<ConversationSummary>;
}

/// Paged access to conversation membership.
#[async_trait]
pub trait ConversationMemberService: Send + Sync + 'static {
    /// Members of `conversation_id`, as visible to `requester_id`.
    ///
    /// `page` is 1-based.
    async fn get_members(
        &self,
        requester_id: UserId,
        conversation_id: ConversationId,
        page: u32,
        page_size: u32,
    ) -> AppResult<MemberPage>;
}
