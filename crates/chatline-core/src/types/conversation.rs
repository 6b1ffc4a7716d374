//! Conversation data returned by the conversation collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ConversationId, UserId};

/// Direct (two-party) or group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// One-to-one conversation.
    Direct,
    /// Named multi-member conversation.
    Group,
}

/// Conversation as listed for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID.
    pub id: ConversationId,
    /// Direct or group.
    pub kind: ConversationKind,
    /// Group name; `None` for direct conversations.
    pub name: Option<String>,
    /// Number of members.
    pub member_count: u32,
    /// Last activity in the conversation.
    pub updated_at: DateTime<Utc>,
}

/// One member of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMember {
    /// Member user ID.
    pub user_id: UserId,
    /// Member role, e.g. `"owner"` or `"member"`.
    pub role: String,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

/// Sort order for conversation listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationOrder {
    /// Most recently active first.
    #[default]
    RecentActivity,
    /// Newest conversation first.
    Newest,
    /// Oldest conversation first.
    Oldest,
}

/// One page of a user's conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPage {
    /// Conversations on this page.
    pub items: Vec<ConversationSummary>,
    /// Total conversations for the user.
    pub total: u64,
}

/// One page of conversation members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPage {
    /// Members on this page.
    pub items: Vec<ConversationMember>,
    /// Total members in the conversation.
    pub total: u64,
}

/// Block relationship between two users, from the first user's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatus {
    /// The first user blocked the second.
    pub is_blocked: bool,
    /// The first user is blocked by the second.
    pub is_blocked_by: bool,
}

impl BlockStatus {
    /// Whether either side blocked the other.
    pub fn any(&self) -> bool {
        self.is_blocked || self.is_blocked_by
    }
}
