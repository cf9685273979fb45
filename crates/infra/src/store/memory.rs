//! In-memory repositories (default backend for dev and tests).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use propdesk_core::{CompanyId, LocationId, MemberId, TenantId, UserId};
use propdesk_locations::{Location, LocationFilter, path};
use propdesk_tenancy::{Company, CompanyMember, Tenant, User};

use super::{
    CompanyRepository, InMemoryTenantStore, LocationRepository, MemberRepository, StoreError,
    StoreResult, TenantRepository, TenantStore, TokenRevocationList, UserRepository,
};

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryTenants {
    rows: RwLock<HashMap<TenantId, Tenant>>,
}

#[async_trait]
impl TenantRepository for InMemoryTenants {
    async fn insert(&self, tenant: Tenant) -> StoreResult<()> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.values().any(|t| t.slug == tenant.slug) {
            return Err(StoreError::Duplicate(format!("Tenant slug '{}' is already taken", tenant.slug)));
        }
        rows.insert(tenant.id, tenant);
        Ok(())
    }

    async fn get(&self, id: TenantId) -> StoreResult<Option<Tenant>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.values().find(|t| t.slug == slug).cloned())
    }

    async fn delete(&self, id: TenantId) -> StoreResult<()> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.remove(&id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUsers {
    rows: InMemoryTenantStore<UserId, User>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn insert(&self, user: User) -> StoreResult<()> {
        self.rows.transact(user.tenant_id, |rows| {
            if rows.values().any(|u| u.email == user.email) {
                return Err(StoreError::Duplicate(format!("E-mail '{}' is already registered", user.email)));
            }
            rows.insert(user.id, user);
            Ok(())
        })
    }

    async fn update(&self, tenant_id: TenantId, user: User) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| match rows.get_mut(&user.id) {
            Some(slot) if user.tenant_id == tenant_id => {
                *slot = user;
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!("User {} does not exist", user.id))),
        })
    }

    async fn get(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        self.rows.get(tenant_id, &id)
    }

    async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        Ok(self.rows.filter(tenant_id, |u| u.email == email)?.into_iter().next())
    }

    async fn list(&self, tenant_id: TenantId, active_only: bool) -> StoreResult<Vec<User>> {
        self.rows.filter(tenant_id, |u| !active_only || u.active)
    }

    async fn resolve_identity(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.rows.find_any(|u| u.id == id)?.map(|(_, u)| u))
    }

    async fn delete(&self, tenant_id: TenantId, id: UserId) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| {
            rows.remove(&id);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCompanies {
    rows: InMemoryTenantStore<CompanyId, Company>,
}

#[async_trait]
impl CompanyRepository for InMemoryCompanies {
    async fn insert(&self, company: Company) -> StoreResult<()> {
        self.rows.transact(company.tenant_id, |rows| {
            if rows.values().any(|c| c.slug == company.slug) {
                return Err(StoreError::Duplicate(format!("Company slug '{}' is already taken", company.slug)));
            }
            rows.insert(company.id, company);
            Ok(())
        })
    }

    async fn get(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<Option<Company>> {
        self.rows.get(tenant_id, &id)
    }

    async fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<Company>> {
        self.rows.list(tenant_id)
    }

    async fn slug_exists(&self, tenant_id: TenantId, slug: &str) -> StoreResult<bool> {
        Ok(!self.rows.filter(tenant_id, |c| c.slug == slug)?.is_empty())
    }

    async fn owner_of(&self, id: CompanyId) -> StoreResult<Option<TenantId>> {
        Ok(self.rows.find_any(|c| c.id == id)?.map(|(tenant_id, _)| tenant_id))
    }

    async fn delete(&self, tenant_id: TenantId, id: CompanyId) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| {
            rows.remove(&id);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMembers {
    rows: InMemoryTenantStore<MemberId, CompanyMember>,
}

#[async_trait]
impl MemberRepository for InMemoryMembers {
    async fn insert(&self, member: CompanyMember) -> StoreResult<()> {
        self.rows.transact(member.tenant_id, |rows| {
            if rows
                .values()
                .any(|m| m.company_id == member.company_id && m.user_id == member.user_id)
            {
                return Err(StoreError::Duplicate("User is already a member of this company".to_string()));
            }
            rows.insert(member.id, member);
            Ok(())
        })
    }

    async fn update(&self, tenant_id: TenantId, member: CompanyMember) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| match rows.get_mut(&member.id) {
            Some(slot) if member.tenant_id == tenant_id => {
                *slot = member;
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!("Membership {} does not exist", member.id))),
        })
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        user_id: UserId,
    ) -> StoreResult<Option<CompanyMember>> {
        Ok(self
            .rows
            .filter(tenant_id, |m| m.company_id == company_id && m.user_id == user_id)?
            .into_iter()
            .next())
    }

    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<CompanyMember>> {
        self.rows.filter(tenant_id, |m| m.user_id == user_id)
    }

    async fn list_for_company(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
    ) -> StoreResult<Vec<CompanyMember>> {
        self.rows.filter(tenant_id, |m| m.company_id == company_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocations {
    rows: InMemoryTenantStore<LocationId, Location>,
}

#[async_trait]
impl LocationRepository for InMemoryLocations {
    async fn insert(&self, location: Location) -> StoreResult<()> {
        self.rows.transact(location.tenant_id, |rows| {
            let parent_path = match location.parent_id {
                Some(parent) => match rows.get(&parent) {
                    Some(p) => Some(p.path.as_str()),
                    None => return Err(StoreError::Conflict(format!("Parent location {parent} does not exist"))),
                },
                None => None,
            };
            // The parent may have been moved since the caller computed the path.
            if path::path_for(parent_path, location.id) != location.path {
                return Err(StoreError::Conflict(format!(
                    "Parent of location {} was moved concurrently",
                    location.id
                )));
            }
            rows.insert(location.id, location);
            Ok(())
        })
    }

    async fn get(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<Option<Location>> {
        self.rows.get(tenant_id, &id)
    }

    async fn update(&self, tenant_id: TenantId, location: Location) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| match rows.get_mut(&location.id) {
            Some(slot) if slot.path == location.path && location.tenant_id == tenant_id => {
                *slot = location;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(format!("Location {} was moved concurrently", location.id))),
            None => Err(StoreError::Conflict(format!("Location {} does not exist", location.id))),
        })
    }

    async fn move_subtree(&self, tenant_id: TenantId, node: Location, old_path: &str) -> StoreResult<()> {
        self.rows.transact(tenant_id, |rows| {
            match rows.get(&node.id) {
                Some(current) if current.path == old_path => {}
                _ => return Err(StoreError::Conflict(format!("Location {} was moved concurrently", node.id))),
            }
            // The new parent may itself have moved since the caller planned.
            if let Some(parent_id) = node.parent_id {
                let parent_ok = rows.get(&parent_id).is_some_and(|p| {
                    !path::is_within(&p.path, old_path) && path::path_for(Some(&p.path), node.id) == node.path
                });
                if !parent_ok {
                    return Err(StoreError::Conflict(format!("Parent location {parent_id} was moved concurrently")));
                }
            }

            let rewrites: Vec<(LocationId, String)> = rows
                .values()
                .filter(|l| path::is_strict_descendant(&l.path, old_path))
                .filter_map(|l| path::rebase(&l.path, old_path, &node.path).map(|p| (l.id, p)))
                .collect();
            let now = node.updated_at;
            for (id, new_path) in rewrites {
                if let Some(row) = rows.get_mut(&id) {
                    row.path = new_path;
                    row.updated_at = now;
                }
            }
            rows.insert(node.id, node);
            Ok(())
        })
    }

    async fn delete(&self, tenant_id: TenantId, id: LocationId) -> StoreResult<bool> {
        self.rows.transact(tenant_id, |rows| {
            if rows.values().any(|l| l.parent_id == Some(id)) {
                return Err(StoreError::Conflict("Location has child locations".to_string()));
            }
            Ok(rows.remove(&id).is_some())
        })
    }

    async fn exists_by_parent(&self, tenant_id: TenantId, parent_id: LocationId) -> StoreResult<bool> {
        Ok(!self.rows.filter(tenant_id, |l| l.parent_id == Some(parent_id))?.is_empty())
    }

    async fn search(&self, tenant_id: TenantId, filter: &LocationFilter) -> StoreResult<Vec<Location>> {
        self.rows.filter(tenant_id, |l| filter.matches(l))
    }

    async fn descendants(&self, tenant_id: TenantId, path: &str) -> StoreResult<Vec<Location>> {
        self.rows.filter(tenant_id, |l| path::is_strict_descendant(&l.path, path))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRevocations {
    rows: RwLock<HashMap<String, DateTime<Utc>>>,
}

#[async_trait]
impl TokenRevocationList for InMemoryRevocations {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        Ok(rows.insert(jti.to_string(), expires_at).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propdesk_auth::RoleSet;
    use propdesk_locations::LocationType;

    #[tokio::test]
    async fn tenant_lookups_never_cross_tenants() {
        let users = InMemoryUsers::default();
        let (a, b) = (TenantId::new(), TenantId::new());
        let alice = User::new(a, "same@mail.test", "h".into(), "Alice", RoleSet::new());
        let bob = User::new(b, "same@mail.test", "h".into(), "Bob", RoleSet::new());
        users.insert(alice.clone()).await.unwrap();
        users.insert(bob.clone()).await.unwrap();

        assert_eq!(users.get(b, alice.id).await.unwrap(), None);
        assert_eq!(users.list(a, false).await.unwrap(), vec![alice.clone()]);
        assert_eq!(
            users.find_by_email(b, "same@mail.test").await.unwrap().map(|u| u.id),
            Some(bob.id)
        );
        assert!(users.update(b, alice).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_per_tenant() {
        let users = InMemoryUsers::default();
        let t = TenantId::new();
        users.insert(User::new(t, "x@y.test", "h".into(), "X", RoleSet::new())).await.unwrap();
        let err = users
            .insert(User::new(t, "X@Y.test", "h".into(), "X2", RoleSet::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn owner_probe_reports_tenant_only() {
        let companies = InMemoryCompanies::default();
        let t = TenantId::new();
        let c = Company::new(t, "Acme", "acme");
        companies.insert(c.clone()).await.unwrap();
        assert_eq!(companies.owner_of(c.id).await.unwrap(), Some(t));
        assert_eq!(companies.owner_of(CompanyId::new()).await.unwrap(), None);
        assert!(companies.get(TenantId::new(), c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_move_changes_nothing() {
        let locations = InMemoryLocations::default();
        let t = TenantId::new();
        let r = Location::new(t, "R", LocationType::Site, None).unwrap();
        let c = Location::new(t, "C", LocationType::Room, Some(&r)).unwrap();
        locations.insert(r.clone()).await.unwrap();
        locations.insert(c.clone()).await.unwrap();

        let mut moved = r.clone();
        moved.path = "/elsewhere".into();
        let err = locations.move_subtree(t, moved, "/not-the-old-path").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(locations.get(t, c.id).await.unwrap().unwrap().path, c.path);
    }

    #[tokio::test]
    async fn a_jti_is_revoked_once() {
        let list = InMemoryRevocations::default();
        let expires = Utc::now() + chrono::Duration::hours(1);
        assert!(list.revoke("jti-1", expires).await.unwrap());
        assert!(!list.revoke("jti-1", expires).await.unwrap());
        assert!(list.revoke("jti-2", expires).await.unwrap());
    }

    #[tokio::test]
    async fn insert_rejects_a_path_stale_against_its_parent() {
        let locations = InMemoryLocations::default();
        let t = TenantId::new();
        let p = Location::new(t, "P", LocationType::Site, None).unwrap();
        let r = Location::new(t, "R", LocationType::Building, None).unwrap();
        let c = Location::new(t, "C", LocationType::Floor, Some(&r)).unwrap();
        for l in [&p, &r, &c] {
            locations.insert(l.clone()).await.unwrap();
        }

        // Planned against C before R moved under P.
        let x = Location::new(t, "X", LocationType::Room, Some(&c)).unwrap();
        let mut moved = r.clone();
        moved.parent_id = Some(p.id);
        moved.path = path::path_for(Some(&p.path), r.id);
        locations.move_subtree(t, moved, &r.path).await.unwrap();

        let err = locations.insert(x.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(locations.get(t, x.id).await.unwrap().is_none());

        let fresh_c = locations.get(t, c.id).await.unwrap().unwrap();
        let retry = Location::new(t, "X", LocationType::Room, Some(&fresh_c)).unwrap();
        locations.insert(retry.clone()).await.unwrap();
        assert!(path::is_strict_descendant(&retry.path, &fresh_c.path));
    }

    #[tokio::test]
    async fn insert_rejects_a_root_with_a_nested_path() {
        let locations = InMemoryLocations::default();
        let t = TenantId::new();
        let mut root = Location::new(t, "R", LocationType::Site, None).unwrap();
        root.path = format!("/{}/{}", LocationId::new(), root.id);
        let err = locations.insert(root).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
