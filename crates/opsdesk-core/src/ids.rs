//! Strongly typed identifiers.
//!
//! Newtype wrappers around [`Uuid`] so that a `TeamId` can never be passed
//! where a `TicketId` is expected. All IDs serialize as plain UUID strings.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when an ID string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Which ID type failed to parse.
    pub id_type: &'static str,
    /// The underlying parse failure.
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Unwrap into the inner UUID.
            #[must_use]
            pub fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Identifier for a tenant (the organization boundary every read and
    /// write is scoped to).
    TenantId
);

define_id!(
    /// Identifier for a team within a tenant.
    TeamId
);

define_id!(
    /// Identifier for a user.
    UserId
);

define_id!(
    /// Identifier for a ticket of any kind.
    TicketId
);

define_id!(
    /// Identifier for an SLA policy.
    PolicyId
);

define_id!(
    /// Identifier for a ticket comment.
    CommentId
);
