//! Discord identifier newtypes.
//!
//! Roles, guilds and users are all addressed by snowflakes.  The service never
//! does arithmetic on them and the `/login` inputs are not guaranteed to be
//! numeric, so each is kept as an opaque string wrapped in its own type to stop
//! a guild id from being passed where a role id is expected.

use std::fmt;

use serde::Deserialize;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string slice.
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            /// Return the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

snowflake_id!(
    /// Identifier of a role inside a guild.
    RoleId
);

snowflake_id!(
    /// Identifier of a guild (Discord server).
    GuildId
);

snowflake_id!(
    /// Identifier of a Discord user.
    UserId
);
