//! Application services: orchestration over the store traits.
//!
//! Services take the caller's [`propdesk_auth::Principal`] and scope every
//! store call by its tenant. Role checks happen before a service is called;
//! services enforce data rules only.

pub mod accounts;
pub mod companies;
pub mod locations;
pub mod users;

pub use accounts::{AccountService, SignupOutcome, SignupRequest, TokenPair};
pub use companies::{BootstrappedCompany, CompanyService};
pub use locations::{LocationInput, LocationService};
pub use users::{NewUser, UserService};
