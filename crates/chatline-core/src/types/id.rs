//! Newtype wrappers around [`uuid::Uuid`] for every identifier the hub
//! routes on.
//!
//! The hub keeps three reverse indexes keyed by different kinds of ids;
//! distinct types make it impossible to look a `ConversationId` up in the
//! user index by accident.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Return the inner UUID value.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user.
    UserId
);

define_id!(
    /// Unique identifier for a conversation (direct or group).
    ConversationId
);

define_id!(
    /// Unique identifier for a business account a user may connect under.
    BusinessId
);

define_id!(
    /// Unique identifier for one live socket. Never reused.
    ConnectionId
);

define_id!(
    /// Server-assigned identifier of a chat message.
    MessageId
);

impl MessageId {
    /// Create a time-ordered message identifier.
    pub fn time_ordered() -> Self {
        Self(Uuid::now_v7())
    }
}
