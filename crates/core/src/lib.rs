//! `propdesk-core` — identifiers and the domain error model shared by every crate.
//!
//! This crate is pure: no IO, no HTTP, no storage.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, LocationId, MemberId, TenantId, UserId};
