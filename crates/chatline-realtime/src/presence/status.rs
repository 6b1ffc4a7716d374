//! Presence status definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatline_core::types::id::UserId;

/// Whether a user has any live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status payload pushed to watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: UserId,
    pub status: PresenceStatus,
    /// When the user's last connection went away, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserStatus {
    /// Online status for a user.
    pub fn online(user_id: UserId) -> Self {
        Self {
            user_id,
            status: PresenceStatus::Online,
            last_seen: None,
        }
    }

    /// Offline status with an optional last-seen time.
    pub fn offline(user_id: UserId, last_seen: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id,
            status: PresenceStatus::Offline,
            last_seen,
        }
    }
}
