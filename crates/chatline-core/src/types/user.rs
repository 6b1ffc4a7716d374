//! User profile as seen by the hub.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Public profile fields used for display in real-time events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID.
    pub id: UserId,
    /// Unique handle.
    pub username: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to the username when unset or blank.
    pub fn name_for_display(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}
