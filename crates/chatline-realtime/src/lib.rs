//! # chatline-realtime
//!
//! Real-time fan-out layer for Chatline. Provides:
//!
//! - Connection registry with per-connection bounded outbound queues
//! - A single hub control loop serializing register/unregister/broadcast
//! - Conversation and presence-watch subscription indexes
//! - Presence tracking derived from live connection counts
//! - Typing indicators with rate-limited start and server-side auto-stop
//! - Command dispatch from inbound client frames to handlers

pub mod collaborators;
pub mod connection;
pub mod dispatch;
pub mod hub;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod ratelimit;
pub mod server;
pub mod subscription;
pub mod typing;

pub use collaborators::Collaborators;
pub use connection::{ConnectionHandle, ConnectionInfo};
pub use dispatch::{CommandContext, CommandDispatcher, CommandHandler};
pub use hub::{BroadcastMessage, BroadcastTarget, Hub, HubLoop, HubStats, Notifier};
pub use message::{InboundCommand, OutboundFrame};
pub use presence::{PresenceStatus, PresenceTracker, UserStatus};
pub use server::RealtimeEngine;
pub use typing::TypingTracker;
