//! User presence tracking.

pub mod status;
pub mod tracker;

pub use status::{PresenceStatus, UserStatus};
pub use tracker::{PresenceTracker, PresenceTransition};
