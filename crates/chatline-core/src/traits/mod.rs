//! Collaborator traits defined in `chatline-core` and implemented outside
//! the real-time hub.

pub mod conversation;
pub mod presence;
pub mod social;

pub use conversation::{ConversationMemberService, ConversationService};
pub use presence::{MessageNotice, NotificationService, PresenceStore};
pub use social::{FriendshipService, UserRepository};
