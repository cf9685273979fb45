//! Infrastructure layer: tenant-scoped storage and the application services
//! that orchestrate it.

pub mod services;
pub mod store;

pub use store::{StoreError, StoreResult, Stores};
