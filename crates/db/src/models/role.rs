use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// Permission tier on an organization, workspace or project.
///
/// Ordered `Owner > Manager > Member > Viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, Display, EnumString)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MemberRole {
    Owner,
    Manager,
    Member,
    Viewer,
}

impl MemberRole {
    fn rank(self) -> u8 {
        match self {
            MemberRole::Owner => 3,
            MemberRole::Manager => 2,
            MemberRole::Member => 1,
            MemberRole::Viewer => 0,
        }
    }

    pub fn at_least(self, required: MemberRole) -> bool {
        self >= required
    }

    /// Owners and managers see everything below the scope they hold the role on.
    pub fn is_elevated(self) -> bool {
        self >= MemberRole::Manager
    }

    pub fn can_write(self) -> bool {
        self >= MemberRole::Member
    }
}

impl PartialOrd for MemberRole {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberRole {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(MemberRole::Owner > MemberRole::Manager);
        assert!(MemberRole::Manager > MemberRole::Member);
        assert!(MemberRole::Member > MemberRole::Viewer);
        assert_eq!(
            [MemberRole::Viewer, MemberRole::Owner, MemberRole::Member]
                .into_iter()
                .max(),
            Some(MemberRole::Owner)
        );
    }

    #[test]
    fn at_least_and_elevation() {
        assert!(MemberRole::Owner.at_least(MemberRole::Manager));
        assert!(!MemberRole::Viewer.at_least(MemberRole::Member));
        assert!(MemberRole::Manager.is_elevated());
        assert!(!MemberRole::Member.is_elevated());
        assert!(!MemberRole::Viewer.can_write());
    }

    #[test]
    fn wire_format_is_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&MemberRole::Manager).unwrap(),
            "\"MANAGER\""
        );
        assert_eq!(MemberRole::from_str("VIEWER").unwrap(), MemberRole::Viewer);
        assert_eq!(MemberRole::Owner.to_string(), "OWNER");
    }
}
