//! `propdesk-tenancy` — tenants, users, companies and company memberships.
//!
//! Pure domain types plus the rules that do not need storage: slug
//! derivation, e-mail normalization, and the company-selection checks.

pub mod company;
pub mod selection;
pub mod slug;
pub mod tenant;
pub mod user;

pub use company::{Company, CompanyMember};
pub use selection::{MembershipSummary, check_selection, summarize_memberships};
pub use tenant::Tenant;
pub use user::User;
