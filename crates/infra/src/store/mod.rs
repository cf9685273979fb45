//! Tenant-scoped entity store.
//!
//! Repository traits take `TenantId` on every tenant-owned read or write. The
//! in-memory backend is the default; Postgres sits behind the `postgres`
//! feature.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;
pub mod tenant_store;

use std::sync::Arc;

pub use repository::{
    CompanyRepository, LocationRepository, MemberRepository, StoreError, StoreResult,
    TenantRepository, TokenRevocationList, UserRepository,
};
pub use tenant_store::{InMemoryTenantStore, TenantStore};

/// Every repository the services need, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub tenants: Arc<dyn TenantRepository>,
    pub users: Arc<dyn UserRepository>,
    pub companies: Arc<dyn CompanyRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub revocations: Arc<dyn TokenRevocationList>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            tenants: Arc::new(memory::InMemoryTenants::default()),
            users: Arc::new(memory::InMemoryUsers::default()),
            companies: Arc::new(memory::InMemoryCompanies::default()),
            members: Arc::new(memory::InMemoryMembers::default()),
            locations: Arc::new(memory::InMemoryLocations::default()),
            revocations: Arc::new(memory::InMemoryRevocations::default()),
        }
    }

    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            tenants: Arc::new(postgres::PostgresTenants::new(pool.clone())),
            users: Arc::new(postgres::PostgresUsers::new(pool.clone())),
            companies: Arc::new(postgres::PostgresCompanies::new(pool.clone())),
            members: Arc::new(postgres::PostgresMembers::new(pool.clone())),
            locations: Arc::new(postgres::PostgresLocations::new(pool.clone())),
            revocations: Arc::new(postgres::PostgresRevocations::new(pool)),
        }
    }
}

impl core::fmt::Debug for Stores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
