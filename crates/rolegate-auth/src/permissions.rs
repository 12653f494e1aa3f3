//! Role safety checks.
//!
//! Two layers:
//!
//! - [`is_forbidden_name`] rejects role identifiers that literally spell out a
//!   sensitive permission.  It needs no API call, so `/login` can apply it, but
//!   it is only a name match and cannot tell what a real role id grants.
//! - [`PermissionBits`] decodes the bitmask Discord reports for a role.  The
//!   callback uses it, when `VERIFY_ROLE_PERMISSIONS` is enabled, to refuse
//!   roles that actually carry a sensitive permission.

use std::str::FromStr;

use crate::ids::RoleId;

/// Permission names a role identifier must never equal.
pub const FORBIDDEN_PERMISSION_NAMES: [&str; 5] = [
    "ADMINISTRATOR",
    "MANAGE_SERVER",
    "MANAGE_ROLES",
    "BAN_MEMBERS",
    "KICK_MEMBERS",
];

/// Whether `role` literally names a forbidden permission.
///
/// Exact, case-sensitive comparison.
pub fn is_forbidden_name(role: &RoleId) -> bool {
    FORBIDDEN_PERMISSION_NAMES.contains(&role.as_str())
}

/// A Discord permission bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionBits(u64);

impl PermissionBits {
    /// `KICK_MEMBERS`.
    pub const KICK_MEMBERS: u64 = 1 << 1;
    /// `BAN_MEMBERS`.
    pub const BAN_MEMBERS: u64 = 1 << 2;
    /// `ADMINISTRATOR`.
    pub const ADMINISTRATOR: u64 = 1 << 3;
    /// `MANAGE_GUILD` (shown as "Manage Server" in the client).
    pub const MANAGE_GUILD: u64 = 1 << 5;
    /// `MANAGE_ROLES`.
    pub const MANAGE_ROLES: u64 = 1 << 28;

    const SENSITIVE: [(u64, &'static str); 5] = [
        (Self::ADMINISTRATOR, "ADMINISTRATOR"),
        (Self::MANAGE_GUILD, "MANAGE_SERVER"),
        (Self::MANAGE_ROLES, "MANAGE_ROLES"),
        (Self::BAN_MEMBERS, "BAN_MEMBERS"),
        (Self::KICK_MEMBERS, "KICK_MEMBERS"),
    ];

    /// Names of the sensitive permissions set in this mask, in
    /// [`FORBIDDEN_PERMISSION_NAMES`] order.
    pub fn sensitive(self) -> Vec<&'static str> {
        Self::SENSITIVE
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

impl FromStr for PermissionBits {
    type Err = std::num::ParseIntError;

    /// Discord serialises permission masks as decimal strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
