//! Identifier newtypes.
//!
//! All IDs are v4 UUIDs. `Display` adds a short prefix for log readability;
//! serde uses the bare UUID string, which is also what the wire protocol
//! and the store carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            /// Parse from a bare UUID or the `Display` form.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Uuid::parse_str(bare)
                    .map(Self)
                    .map_err(|_| CoreError::InvalidId(s.to_string()))
            }
        }
    };
}

id_type!(
    /// Unique identifier for a session.
    SessionId,
    "sess"
);

id_type!(
    /// Unique identifier for an approval request.
    RequestId,
    "req"
);

id_type!(
    /// Unique identifier for a review.
    ReviewId,
    "rev"
);

id_type!(
    /// Unique identifier for a pattern removal request.
    RemovalId,
    "rmv"
);
