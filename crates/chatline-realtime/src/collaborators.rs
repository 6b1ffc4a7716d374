//! External services the hub consults.

use std::sync::Arc;

use chatline_core::error::{AppError, AppResult};
use chatline_core::traits::{
    ConversationMemberService, ConversationService, FriendshipService, UserRepository,
};

/// Collaborators available at construction time.
///
/// Every slot is optional. A handler that needs an absent collaborator
/// reports `SERVICE_UNAVAILABLE`; lookups that are only advisory (such
/// as membership for joining, display names for typing) are skipped.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Conversation persistence and membership.
    pub conversations: Option<Arc<dyn ConversationService>>,
    /// Paged membership listings.
    pub members: Option<Arc<dyn ConversationMemberService>>,
    /// Block relationships.
    pub friendships: Option<Arc<dyn FriendshipService>>,
    /// Profile lookups.
    pub users: Option<Arc<dyn UserRepository>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("conversations", &self.conversations.is_some())
            .field("members", &self.members.is_some())
            .field("friendships", &self.friendships.is_some())
            .field("users", &self.users.is_some())
            .finish()
    }
}

impl Collaborators {
    /// No collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conversation service.
    pub fn with_conversations(mut self, service: Arc<dyn ConversationService>) -> Self {
        self.conversations = Some(service);
        self
    }

    /// Set the conversation member service.
    pub fn with_members(mut self, service: Arc<dyn ConversationMemberService>) -> Self {
        self.members = Some(service);
        self
    }

    /// Set the friendship service.
    pub fn with_friendships(mut self, service: Arc<dyn FriendshipService>) -> Self {
        self.friendships = Some(service);
        self
    }

    /// Set the user repository.
    pub fn with_users(mut self, repository: Arc<dyn UserRepository>) -> Self {
        self.users = Some(repository);
        self
    }

    /// Conversation service or `SERVICE_UNAVAILABLE`.
    pub fn require_conversations(&self) -> AppResult<&Arc<dyn ConversationService>> {
        self.conversations
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("Conversation service is not configured"))
    }

    /// Member service or `SERVICE_UNAVAILABLE`.
    pub fn require_members(&self) -> AppResult<&Arc<dyn ConversationMemberService>> {
        self.members
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("Member service is not configured"))
    }
}
