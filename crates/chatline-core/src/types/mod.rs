//! Core type definitions used across the Chatline workspace.

pub mod conversation;
pub mod id;
pub mod user;

pub use conversation::{
    BlockStatus, ConversationKind, ConversationMember, ConversationOrder, ConversationPage,
    ConversationSummary, MemberPage,
};
pub use id::*;
pub use user::UserProfile;
