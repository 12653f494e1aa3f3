//! The OAuth2 `state` value linking `/login` to `/callback`.
//!
//! The role and guild travel through Discord's redirect as
//! `"<role>:<guild>"`.  The delimiter can never appear inside either
//! component: [`StateToken::new`] refuses identifiers containing it, and
//! [`StateToken::from_str`] refuses anything that does not split into exactly
//! two non-empty parts.  Snowflake ids therefore produce the familiar
//! `"123:456"` form while malformed input stops at the callback instead of
//! leaking into Discord API paths.

use std::fmt;
use std::str::FromStr;

use crate::error::GateError;
use crate::ids::{GuildId, RoleId};

/// Separator between the role and guild components.
pub const STATE_DELIMITER: char = ':';

/// Role/guild pair carried across the OAuth2 redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    /// Role to grant.
    pub role: RoleId,
    /// Guild the role belongs to.
    pub guild: GuildId,
}

impl StateToken {
    /// Build a token, rejecting identifiers that are empty or contain
    /// [`STATE_DELIMITER`].
    pub fn new(role: RoleId, guild: GuildId) -> Result<Self, GateError> {
        for (label, value) in [("role", role.as_str()), ("guild", guild.as_str())] {
            if value.is_empty() {
                return Err(GateError::InvalidIdentifier(format!("{label} must not be empty")));
            }
            if value.contains(STATE_DELIMITER) {
                return Err(GateError::InvalidIdentifier(format!(
                    "{label} must not contain '{STATE_DELIMITER}'"
                )));
            }
        }
        Ok(Self { role, guild })
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{STATE_DELIMITER}{}", self.role, self.guild)
    }
}

impl FromStr for StateToken {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, guild) = s.split_once(STATE_DELIMITER).ok_or_else(|| {
            GateError::InvalidState(format!("expected role{STATE_DELIMITER}guild"))
        })?;

        Self::new(RoleId::new(role), GuildId::new(guild))
            .map_err(|e| GateError::InvalidState(e.to_string()))
    }
}
