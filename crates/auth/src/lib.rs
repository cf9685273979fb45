//! `propdesk-auth` — pure authentication/authorization boundary.
//!
//! Token codec, password hashing, the closed role enumeration and the
//! declarative policy evaluator. This crate is intentionally decoupled from
//! HTTP and storage.

pub mod claims;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod token;

pub use claims::{AccessClaims, RefreshClaims, REFRESH_TOKEN_TYPE};
pub use password::{Argon2PasswordHasher, PasswordError, PasswordHasher};
pub use policy::{Decision, Denial, Policy, RequestFacts};
pub use principal::Principal;
pub use roles::{Role, RoleSet, UnknownRole};
pub use token::{AccessTokenCheck, InvalidReason, RefreshGrant, TokenCodec, TokenError, TokenSettings};
