//! Declarative role policies.
//!
//! A [`Policy`] is a small boolean expression over the caller's roles and
//! the request's parameters. Evaluation is pure:
//!
//! - No IO
//! - No panics
//! - No business logic
//!
//! Missing identity always yields [`Denial::Unauthenticated`], so callers can
//! tell "who are you?" (401) apart from "you may not" (403).

use std::borrow::Cow;
use std::collections::HashMap;

use crate::{Principal, Role, RoleSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Any authenticated principal.
    Authenticated,
    /// At least one of the roles.
    AnyRole(RoleSet),
    /// Every one of the roles.
    AllRoles(RoleSet),
    /// Request parameter equals the value (ASCII case-insensitive).
    ParamEquals {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
    },
    AnyOf(Vec<Policy>),
    AllOf(Vec<Policy>),
}

/// Request attributes a policy may consult besides the principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFacts {
    params: HashMap<String, String>,
}

impl RequestFacts {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub fn authenticated() -> Policy {
    Policy::Authenticated
}

pub fn any_role(roles: impl IntoIterator<Item = Role>) -> Policy {
    Policy::AnyRole(roles.into_iter().collect())
}

pub fn all_roles(roles: impl IntoIterator<Item = Role>) -> Policy {
    Policy::AllRoles(roles.into_iter().collect())
}

pub fn param_equals(name: &'static str, value: &'static str) -> Policy {
    Policy::ParamEquals {
        name: Cow::Borrowed(name),
        value: Cow::Borrowed(value),
    }
}

pub fn any_of(policies: impl IntoIterator<Item = Policy>) -> Policy {
    Policy::AnyOf(policies.into_iter().collect())
}

pub fn all_of(policies: impl IntoIterator<Item = Policy>) -> Policy {
    Policy::AllOf(policies.into_iter().collect())
}

impl Policy {
    pub fn or(self, other: Policy) -> Policy {
        any_of([self, other])
    }

    pub fn and(self, other: Policy) -> Policy {
        all_of([self, other])
    }

    pub fn evaluate(&self, principal: Option<&Principal>, facts: &RequestFacts) -> Decision {
        match principal {
            None => Decision::Deny(Denial::Unauthenticated),
            Some(p) if self.holds(p, facts) => Decision::Allow,
            Some(_) => Decision::Deny(Denial::Forbidden),
        }
    }

    fn holds(&self, principal: &Principal, facts: &RequestFacts) -> bool {
        match self {
            Policy::Authenticated => true,
            Policy::AnyRole(roles) => principal.has_any_role(roles),
            Policy::AllRoles(roles) => principal.has_all_roles(roles),
            Policy::ParamEquals { name, value } => facts
                .param(name)
                .is_some_and(|v| v.eq_ignore_ascii_case(value)),
            Policy::AnyOf(ps) => ps.iter().any(|p| p.holds(principal, facts)),
            Policy::AllOf(ps) => ps.iter().all(|p| p.holds(principal, facts)),
        }
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fn join(f: &mut core::fmt::Formatter<'_>, ps: &[Policy], sep: &str) -> core::fmt::Result {
            f.write_str("(")?;
            for (i, p) in ps.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{p}")?;
            }
            f.write_str(")")
        }

        match self {
            Policy::Authenticated => f.write_str("authenticated"),
            Policy::AnyRole(rs) => write!(f, "any_role[{}]", crate::roles::roles_to_csv(rs)),
            Policy::AllRoles(rs) => write!(f, "all_roles[{}]", crate::roles::roles_to_csv(rs)),
            Policy::ParamEquals { name, value } => write!(f, "{name}={value}"),
            Policy::AnyOf(ps) => join(f, ps, " or "),
            Policy::AllOf(ps) => join(f, ps, " and "),
        }
    }
}
