//! Postgres-backed repositories.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Slug / e-mail / membership already taken |
//! | Database (foreign key violation) | `23503` | `Conflict` | Delete of a location that still has children |
//! | Database (check constraint violation) | `23514` | `Conflict` | Path does not end with the node id |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | Other | N/A | `Backend` | Pool closed, network errors, decode failures |
//!
//! ## Tenant Isolation
//!
//! Every tenant-owned query binds `tenant_id` in its WHERE clause. The only
//! exceptions are the global-key lookups named on the repository traits.
//!
//! Schema lives in `crates/infra/migrations/`; run [`migrate`] at startup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use propdesk_auth::RoleSet;
use propdesk_auth::roles::{roles_from_csv, roles_to_csv};
use propdesk_core::{CompanyId, LocationId, MemberId, TenantId, UserId};
use propdesk_locations::{Location, LocationFilter, LocationType, path};
use propdesk_tenancy::{Company, CompanyMember, Tenant, User};

use super::{
    CompanyRepository, LocationRepository, MemberRepository, StoreError, StoreResult,
    TenantRepository, TokenRevocationList, UserRepository,
};

/// Apply the bundled migrations.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("23503") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn decode_roles(csv: &str) -> Result<RoleSet, sqlx::Error> {
    roles_from_csv(csv).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, sqlx::Error> {
    Ok(Tenant {
        id: TenantId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let roles: String = row.try_get("roles")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        display_name: row.try_get("display_name")?,
        roles: decode_roles(&roles)?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn company_from_row(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        id: CompanyId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<CompanyMember, sqlx::Error> {
    let roles: String = row.try_get("roles")?;
    Ok(CompanyMember {
        id: MemberId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        active: row.try_get("active")?,
        roles: decode_roles(&roles)?,
    })
}

fn location_from_row(row: &PgRow) -> Result<Location, sqlx::Error> {
    let location_type: String = row.try_get("location_type")?;
    let parent_id: Option<uuid::Uuid> = row.try_get("parent_id")?;
    Ok(Location {
        id: LocationId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        location_type: location_type
            .parse::<LocationType>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        parent_id: parent_id.map(LocationId::from_uuid),
        path: row.try_get("path")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_all<T>(
    operation: &str,
    rows: Vec<PgRow>,
    f: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    rows.iter().map(|r| f(r).map_err(|e| map_sqlx_error(operation, e))).collect()
}

fn decode_opt<T>(
    operation: &str,
    row: Option<PgRow>,
    f: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Option<T>> {
    row.as_ref().map(f).transpose().map_err(|e| map_sqlx_error(operation, e))
}

const USER_COLUMNS: &str =
    "id, tenant_id, email, password_hash, full_name, display_name, roles, active, created_at";
const LOCATION_COLUMNS: &str =
    "id, tenant_id, name, location_type, parent_id, path, active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresTenants {
    pool: Arc<PgPool>,
}

impl PostgresTenants {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenants {
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), err)]
    async fn insert(&self, tenant: Tenant) -> StoreResult<()> {
        sqlx::query("INSERT INTO tenants (id, name, slug, created_at) VALUES ($1, $2, $3, $4)")
            .bind(tenant.id.as_uuid())
            .bind(&tenant.name)
            .bind(&tenant.slug)
            .bind(tenant.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_tenant", e))?;
        Ok(())
    }

    async fn get(&self, id: TenantId) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_tenant", e))?;
        decode_opt("get_tenant", row, tenant_from_row)
    }

    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_slug", e))?;
        decode_opt("find_tenant_by_slug", row, tenant_from_row)
    }

    async fn delete(&self, id: TenantId) -> StoreResult<()> {
        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_tenant", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresUsers {
    pool: Arc<PgPool>,
}

impl PostgresUsers {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUsers {
    #[instrument(skip(self, user), fields(tenant_id = %user.tenant_id, user_id = %user.id), err)]
    async fn insert(&self, user: User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, password_hash, full_name, display_name, roles, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.tenant_id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.display_name)
        .bind(roles_to_csv(&user.roles))
        .bind(user.active)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn update(&self, tenant_id: TenantId, user: User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = $3, display_name = $4, roles = $5, active = $6, password_hash = $7
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.display_name)
        .bind(roles_to_csv(&user.roles))
        .bind(user.active)
        .bind(&user.password_hash)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("User {} does not exist", user.id)));
        }
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2"))
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        decode_opt("get_user", row, user_from_row)
    }

    async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND email = $2"))
            .bind(tenant_id.as_uuid())
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        decode_opt("find_user_by_email", row, user_from_row)
    }

    async fn list(&self, tenant_id: TenantId, active_only: bool) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND ($2 = FALSE OR active) ORDER BY email"
        ))
        .bind(tenant_id.as_uuid())
        .bind(active_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;
        decode_all("list_users", rows, user_from_row)
    }

    async fn resolve_identity(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_identity", e))?;
        decode_opt("resolve_identity", row, user_from_row)
    }

    async fn delete(&self, tenant_id: TenantId, id: UserId) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresCompanies {
    pool: Arc<PgPool>,
}

impl PostgresCompanies {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyRepository for PostgresCompanies {
    #[instrument(skip(self, company), fields(tenant_id = %company.tenant_id, company_id = %company.id), err)]
    async fn insert(&self, company: Company) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO companies (id, tenant_id, name, slug, active, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(company.id.as_uuid())
        .bind(company.tenant_id.as_uuid())
        .bind(&company.name)
        .bind(&company.slug)
        .bind(company.active)
        .bind(company.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_company", e))?;
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<Option<Company>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, slug, active, created_at FROM companies WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_company", e))?;
        decode_opt("get_company", row, company_from_row)
    }

    async fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<Company>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name, slug, active, created_at FROM companies WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_companies", e))?;
        decode_all("list_companies", rows, company_from_row)
    }

    async fn slug_exists(&self, tenant_id: TenantId, slug: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM companies WHERE tenant_id = $1 AND slug = $2) AS taken")
            .bind(tenant_id.as_uuid())
            .bind(slug)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_slug_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("company_slug_exists", e))
    }

    async fn owner_of(&self, id: CompanyId) -> StoreResult<Option<TenantId>> {
        let row = sqlx::query("SELECT tenant_id FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_owner_of", e))?;
        decode_opt("company_owner_of", row, |r| {
            r.try_get::<uuid::Uuid, _>("tenant_id").map(TenantId::from_uuid)
        })
    }

    async fn delete(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<()> {
        sqlx::query("DELETE FROM companies WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_company", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresMembers {
    pool: Arc<PgPool>,
}

impl PostgresMembers {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PostgresMembers {
    async fn insert(&self, member: CompanyMember) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO company_members (id, tenant_id, company_id, user_id, active, roles)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (SELECT 1 FROM companies WHERE id = $3 AND tenant_id = $2)
            "#,
        )
        .bind(member.id.as_uuid())
        .bind(member.tenant_id.as_uuid())
        .bind(member.company_id.as_uuid())
        .bind(member.user_id.as_uuid())
        .bind(member.active)
        .bind(roles_to_csv(&member.roles))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_member", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("Company {} does not exist", member.company_id)));
        }
        Ok(())
    }

    async fn update(&self, tenant_id: TenantId, member: CompanyMember) -> StoreResult<()> {
        let result = sqlx::query("UPDATE company_members SET active = $3, roles = $4 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(member.id.as_uuid())
            .bind(member.active)
            .bind(roles_to_csv(&member.roles))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_member", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("Membership {} does not exist", member.id)));
        }
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        user_id: UserId,
    ) -> StoreResult<Option<CompanyMember>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, company_id, user_id, active, roles
            FROM company_members
            WHERE tenant_id = $1 AND company_id = $2 AND user_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_member", e))?;
        decode_opt("find_member", row, member_from_row)
    }

    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<CompanyMember>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, company_id, user_id, active, roles FROM company_members WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_members_for_user", e))?;
        decode_all("list_members_for_user", rows, member_from_row)
    }

    async fn list_for_company(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
    ) -> StoreResult<Vec<CompanyMember>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, company_id, user_id, active, roles FROM company_members WHERE tenant_id = $1 AND company_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_members_for_company", e))?;
        decode_all("list_members_for_company", rows, member_from_row)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresLocations {
    pool: Arc<PgPool>,
}

impl PostgresLocations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for PostgresLocations {
    /// Shares the lock on every ancestor, so a concurrent `move_subtree` of
    /// any of them either finishes first (and the parent path no longer
    /// matches) or waits for this insert and then rewrites the new row too.
    #[instrument(skip(self, location), fields(tenant_id = %location.tenant_id, location_id = %location.id), err)]
    async fn insert(&self, location: Location) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match location.parent_id {
            Some(parent_id) => {
                let mut chain = path::ancestry(&location.path)
                    .map_err(|e| StoreError::Conflict(e.to_string()))?;
                chain.pop();
                let chain: Vec<uuid::Uuid> = chain.iter().map(|id| *id.as_uuid()).collect();
                let rows = sqlx::query("SELECT id, path FROM locations WHERE tenant_id = $1 AND id = ANY($2) FOR SHARE")
                    .bind(location.tenant_id.as_uuid())
                    .bind(&chain)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock_ancestors", e))?;

                let mut parent_path = None;
                for row in &rows {
                    let id: uuid::Uuid = row.try_get("id").map_err(|e| map_sqlx_error("lock_ancestors", e))?;
                    if id == *parent_id.as_uuid() {
                        let p: String = row.try_get("path").map_err(|e| map_sqlx_error("lock_ancestors", e))?;
                        parent_path = Some(p);
                    }
                }
                let Some(parent_path) = parent_path else {
                    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(StoreError::Conflict(format!("Parent location {parent_id} does not exist")));
                };
                if path::path_for(Some(&parent_path), location.id) != location.path {
                    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(StoreError::Conflict(format!(
                        "Parent of location {} was moved concurrently",
                        location.id
                    )));
                }
            }
            None if path::path_for(None, location.id) != location.path => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!("Root location {} has a nested path", location.id)));
            }
            None => {}
        }

        sqlx::query(
            r#"
            INSERT INTO locations (id, tenant_id, name, location_type, parent_id, path, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(location.tenant_id.as_uuid())
        .bind(&location.name)
        .bind(location.location_type.as_str())
        .bind(location.parent_id.map(|p| *p.as_uuid()))
        .bind(&location.path)
        .bind(location.active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_location", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn get(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<Option<Location>> {
        let row = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_location", e))?;
        decode_opt("get_location", row, location_from_row)
    }

    async fn update(&self, tenant_id: TenantId, location: Location) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE locations
            SET name = $3, location_type = $4, active = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2 AND path = $7
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(location.location_type.as_str())
        .bind(location.active)
        .bind(location.updated_at)
        .bind(&location.path)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_location", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("Location {} was moved concurrently", location.id)));
        }
        Ok(())
    }

    #[instrument(skip(self, node), fields(tenant_id = %tenant_id, location_id = %node.id, rewritten = tracing::field::Empty), err)]
    async fn move_subtree(&self, tenant_id: TenantId, node: Location, old_path: &str) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: Option<String> =
            sqlx::query("SELECT path FROM locations WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                .bind(tenant_id.as_uuid())
                .bind(node.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_location", e))?
                .map(|r| r.try_get("path"))
                .transpose()
                .map_err(|e| map_sqlx_error("lock_location", e))?;
        if current.as_deref() != Some(old_path) {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!("Location {} was moved concurrently", node.id)));
        }

        if let Some(parent_id) = node.parent_id {
            let parent_path: Option<String> =
                sqlx::query("SELECT path FROM locations WHERE tenant_id = $1 AND id = $2 FOR SHARE")
                    .bind(tenant_id.as_uuid())
                    .bind(parent_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock_parent", e))?
                    .map(|r| r.try_get("path"))
                    .transpose()
                    .map_err(|e| map_sqlx_error("lock_parent", e))?;
            let parent_ok = parent_path.is_some_and(|p| {
                !path::is_within(&p, old_path) && path::path_for(Some(&p), node.id) == node.path
            });
            if !parent_ok {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!(
                    "Parent location {parent_id} was moved concurrently"
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE locations
            SET name = $3, location_type = $4, parent_id = $5, path = $6, active = $7, updated_at = $8
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(node.id.as_uuid())
        .bind(&node.name)
        .bind(node.location_type.as_str())
        .bind(node.parent_id.map(|p| *p.as_uuid()))
        .bind(&node.path)
        .bind(node.active)
        .bind(node.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("move_location", e))?;

        let rewritten = sqlx::query(
            r#"
            UPDATE locations
            SET path = $3 || substring(path FROM char_length($2) + 1), updated_at = $4
            WHERE tenant_id = $1 AND starts_with(path, $2 || '/')
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(old_path)
        .bind(&node.path)
        .bind(node.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rewrite_subtree", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::Span::current().record("rewritten", rewritten.rows_affected());
        Ok(())
    }

    async fn delete(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM locations WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_location", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_by_parent(&self, tenant_id: TenantId, parent_id: LocationId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM locations WHERE tenant_id = $1 AND parent_id = $2) AS has_children",
        )
        .bind(tenant_id.as_uuid())
        .bind(parent_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists_by_parent", e))?;
        row.try_get("has_children").map_err(|e| map_sqlx_error("exists_by_parent", e))
    }

    async fn search(&self, tenant_id: TenantId, filter: &LocationFilter) -> StoreResult<Vec<Location>> {
        let q = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LOCATION_COLUMNS}
            FROM locations
            WHERE tenant_id = $1
                AND ($2::text IS NULL OR location_type = $2)
                AND ($3::uuid IS NULL OR parent_id = $3)
                AND ($4::boolean IS NULL OR active = $4)
                AND ($5::text IS NULL OR strpos(lower(name), $5) > 0)
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(filter.location_type.map(|t| t.as_str()))
        .bind(filter.parent_id.map(|p| *p.as_uuid()))
        .bind(filter.active)
        .bind(q)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_locations", e))?;
        decode_all("search_locations", rows, location_from_row)
    }

    async fn descendants(&self, tenant_id: TenantId, path: &str) -> StoreResult<Vec<Location>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE tenant_id = $1 AND starts_with(path, $2 || '/')"
        ))
        .bind(tenant_id.as_uuid())
        .bind(path)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("location_descendants", e))?;
        decode_all("location_descendants", rows, location_from_row)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRevocations {
    pool: Arc<PgPool>,
}

impl PostgresRevocations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRevocationList for PostgresRevocations {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING")
                .bind(jti)
                .bind(expires_at)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("revoke_token", e))?;
        Ok(result.rows_affected() == 1)
    }
}
