//! Social graph and user lookups.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::types::conversation::BlockStatus;
use crate::types::id::UserId;
use crate::types::user::UserProfile;

/// Friendship and block relationships.
#[async_trait]
pub trait FriendshipService: Send + Sync + 'static {
    /// Block status of `user_id` towards `other_id`.
    async fn check_block_status(&self, user_id: UserId, other_id: UserId)
    -> AppResult<BlockStatus>;
}

/// Read access to user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Find a user by ID. Returns `None` if the user does not exist.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserProfile>>;
}
