use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// Closed enumeration; names are upper-case and matched case-sensitively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Technician,
    Viewer,
    Accountant,
    User,
}

/// Ordered role set. Ordering follows declaration order, so CSV output is stable.
pub type RoleSet = BTreeSet<Role>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Owner,
        Role::Admin,
        Role::Manager,
        Role::Technician,
        Role::Viewer,
        Role::Accountant,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Technician => "TECHNICIAN",
            Role::Viewer => "VIEWER",
            Role::Accountant => "ACCOUNTANT",
            Role::User => "USER",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Parse role names, failing on the first unknown one.
pub fn parse_roles<I, S>(names: I) -> Result<RoleSet, UnknownRole>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().parse()).collect()
}

/// Names in `names` that are not roles, in input order.
pub fn unknown_role_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|n| n.as_ref().parse::<Role>().is_err())
        .map(|n| n.as_ref().to_string())
        .collect()
}

/// Comma-separated form used by the `roles` token claim.
pub fn roles_to_csv(roles: &RoleSet) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
}

/// Inverse of [`roles_to_csv`]. An empty string is the empty set.
pub fn roles_from_csv(csv: &str) -> Result<RoleSet, UnknownRole> {
    parse_roles(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_case_sensitive() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("admin".parse::<Role>(), Err(UnknownRole("admin".into())));
    }

    #[test]
    fn csv_is_ordered_and_reversible() {
        let roles: RoleSet = [Role::Viewer, Role::Owner, Role::Admin].into_iter().collect();
        let csv = roles_to_csv(&roles);
        assert_eq!(csv, "OWNER,ADMIN,VIEWER");
        assert_eq!(roles_from_csv(&csv).unwrap(), roles);
        assert!(roles_from_csv("").unwrap().is_empty());
    }

    #[test]
    fn unknown_names_are_reported() {
        let bad = unknown_role_names(["OWNER", "SUPERUSER", "viewer"]);
        assert_eq!(bad, vec!["SUPERUSER".to_string(), "viewer".to_string()]);
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_string(&Role::Technician).unwrap();
        assert_eq!(json, "\"TECHNICIAN\"");
        assert!(serde_json::from_str::<Role>("\"technician\"").is_err());
    }
}
