use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use propdesk_core::{CompanyId, DomainError, LocationId, TenantId, UserId};
use propdesk_locations::{Location, LocationFilter};
use propdesk_tenancy::{Company, CompanyMember, Tenant, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The row changed between read and write, or a referential rule blocked
    /// the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) | StoreError::Conflict(msg) => DomainError::conflict(msg),
            StoreError::Backend(msg) => DomainError::storage(msg),
        }
    }
}

/// Tenants are the isolation root, so lookups here are by global keys.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// `Duplicate` when the slug is taken.
    async fn insert(&self, tenant: Tenant) -> StoreResult<()>;
    async fn get(&self, id: TenantId) -> StoreResult<Option<Tenant>>;
    /// Pre-authentication lookup used by login.
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>>;
    /// Only for undoing a signup; the tenant must own no other rows.
    async fn delete(&self, id: TenantId) -> StoreResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `Duplicate` when the e-mail is taken within the tenant.
    async fn insert(&self, user: User) -> StoreResult<()>;
    async fn update(&self, tenant_id: TenantId, user: User) -> StoreResult<()>;
    async fn get(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>>;
    async fn list(&self, tenant_id: TenantId, active_only: bool) -> StoreResult<Vec<User>>;
    /// Pre-authentication lookup used by token refresh, where only the user
    /// id is known.
    async fn resolve_identity(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn delete(&self, tenant_id: TenantId, id: UserId) -> StoreResult<()>;
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// `Duplicate` when the slug is taken within the tenant.
    async fn insert(&self, company: Company) -> StoreResult<()>;
    async fn get(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<Option<Company>>;
    async fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<Company>>;
    async fn slug_exists(&self, tenant_id: TenantId, slug: &str) -> StoreResult<bool>;
    /// Owning tenant of a company, never the row itself. Lets company
    /// selection tell "no such company" apart from "not yours".
    async fn owner_of(&self, id: CompanyId) -> StoreResult<Option<TenantId>>;
    async fn delete(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<()>;
}

#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// `Duplicate` when the user is already a member of the company.
    async fn insert(&self, member: CompanyMember) -> StoreResult<()>;
    async fn update(&self, tenant_id: TenantId, member: CompanyMember) -> StoreResult<()>;
    async fn find(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        user_id: UserId,
    ) -> StoreResult<Option<CompanyMember>>;
    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<CompanyMember>>;
    async fn list_for_company(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
    ) -> StoreResult<Vec<CompanyMember>>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn insert(&self, location: Location) -> StoreResult<()>;
    async fn get(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<Option<Location>>;
    /// Overwrite a node whose path did not change.
    async fn update(&self, tenant_id: TenantId, location: Location) -> StoreResult<()>;
    /// Write `node` (already carrying its new path) and rebase every
    /// descendant of `old_path` onto it, all or nothing.
    ///
    /// `Conflict` when the stored node no longer has `old_path`.
    async fn move_subtree(&self, tenant_id: TenantId, node: Location, old_path: &str) -> StoreResult<()>;
    /// `false` when nothing was deleted.
    async fn delete(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<bool>;
    async fn exists_by_parent(&self, tenant_id: TenantId, parent_id: LocationId) -> StoreResult<bool>;
    /// Unordered; callers sort.
    async fn search(&self, tenant_id: TenantId, filter: &LocationFilter) -> StoreResult<Vec<Location>>;
    /// Strict descendants of the node at `path`.
    async fn descendants(&self, tenant_id: TenantId, path: &str) -> StoreResult<Vec<Location>>;
}

/// Refresh tokens that were rotated or logged out, keyed by `jti`.
#[async_trait]
pub trait TokenRevocationList: Send + Sync {
    /// `true` when `jti` was not revoked before. Callers that must spend a
    /// token exactly once act on this, never on a prior `is_revoked`.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<bool>;
}
