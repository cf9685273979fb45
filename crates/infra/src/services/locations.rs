//! Location hierarchy engine.
//!
//! Paths are computed before any write. A reparent rewrites the node and its
//! whole subtree through one atomic store call, so readers see either the
//! old tree or the new one.

use chrono::Utc;
use tracing::{debug, info};

use propdesk_auth::Principal;
use propdesk_core::{DomainError, DomainResult, LocationId, TenantId};
use propdesk_locations::{
    Location, LocationFilter, LocationType, TreeNode, build_tree, plan_move, sibling_order,
};

use crate::store::Stores;

/// Fields a caller sets on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInput {
    pub name: String,
    pub location_type: LocationType,
    pub parent_id: Option<LocationId>,
}

#[derive(Debug, Clone)]
pub struct LocationService {
    stores: Stores,
}

impl LocationService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn get(&self, principal: &Principal, id: LocationId) -> DomainResult<Location> {
        self.load(principal.tenant_id, id).await
    }

    pub async fn create(&self, principal: &Principal, input: LocationInput) -> DomainResult<Location> {
        let name = required_name(&input.name)?;
        let parent = self.load_parent(principal.tenant_id, input.parent_id).await?;
        let location = Location::new(principal.tenant_id, name, input.location_type, parent.as_ref())?;
        self.stores.locations.insert(location.clone()).await?;
        debug!(location_id = %location.id, path = %location.path, "location created");
        Ok(location)
    }

    /// Rename, retype and possibly reparent.
    ///
    /// Self-parenting or moving under an own descendant is a `Conflict` and
    /// leaves the node and its subtree untouched.
    pub async fn update(&self, principal: &Principal, id: LocationId, input: LocationInput) -> DomainResult<Location> {
        let tenant_id = principal.tenant_id;
        let node = self.load(tenant_id, id).await?;
        if input.parent_id == Some(id) {
            return Err(DomainError::conflict("Location cannot be its own parent"));
        }
        let parent = self.load_parent(tenant_id, input.parent_id).await?;
        let new_path = plan_move(&node, parent.as_ref())?;

        let mut updated = node.clone();
        updated.name = required_name(&input.name)?.to_string();
        updated.location_type = input.location_type;
        updated.parent_id = input.parent_id;
        updated.path = new_path;
        updated.updated_at = Utc::now();

        if updated.path == node.path {
            self.stores.locations.update(tenant_id, updated.clone()).await?;
        } else {
            self.stores
                .locations
                .move_subtree(tenant_id, updated.clone(), &node.path)
                .await?;
            info!(location_id = %id, from = %node.path, to = %updated.path, "location reparented");
        }
        Ok(updated)
    }

    /// Idempotent: deleting a missing location succeeds.
    pub async fn delete(&self, principal: &Principal, id: LocationId) -> DomainResult<()> {
        let tenant_id = principal.tenant_id;
        if self.stores.locations.get(tenant_id, id).await?.is_none() {
            return Ok(());
        }
        if self.stores.locations.exists_by_parent(tenant_id, id).await? {
            return Err(DomainError::conflict("Location has child locations and cannot be deleted"));
        }
        self.stores.locations.delete(tenant_id, id).await?;
        debug!(location_id = %id, "location deleted");
        Ok(())
    }

    /// Active locations nested from the roots.
    pub async fn tree(&self, principal: &Principal) -> DomainResult<Vec<TreeNode>> {
        let filter = LocationFilter {
            active: Some(true),
            ..LocationFilter::default()
        };
        let active = self.stores.locations.search(principal.tenant_id, &filter).await?;
        Ok(build_tree(active))
    }

    pub async fn search(&self, principal: &Principal, filter: &LocationFilter) -> DomainResult<Vec<Location>> {
        let mut found = self.stores.locations.search(principal.tenant_id, filter).await?;
        found.sort_by(sibling_order);
        Ok(found)
    }

    /// The subtree below `id`, shallowest first.
    pub async fn descendants(&self, principal: &Principal, id: LocationId) -> DomainResult<Vec<Location>> {
        let node = self.load(principal.tenant_id, id).await?;
        let mut below = self.stores.locations.descendants(principal.tenant_id, &node.path).await?;
        below.sort_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| sibling_order(a, b)));
        Ok(below)
    }

    pub async fn set_active(&self, principal: &Principal, id: LocationId, active: bool) -> DomainResult<Location> {
        let mut node = self.load(principal.tenant_id, id).await?;
        if node.active != active {
            node.active = active;
            node.updated_at = Utc::now();
            self.stores.locations.update(principal.tenant_id, node.clone()).await?;
        }
        Ok(node)
    }

    async fn load(&self, tenant_id: TenantId, id: LocationId) -> DomainResult<Location> {
        self.stores
            .locations
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Location {id} not found")))
    }

    async fn load_parent(&self, tenant_id: TenantId, parent_id: Option<LocationId>) -> DomainResult<Option<Location>> {
        match parent_id {
            None => Ok(None),
            Some(pid) => self.stores.locations.get(tenant_id, pid).await?.map(Some).ok_or_else(|| {
                DomainError::not_found(format!("Parent location {pid} not found"))
            }),
        }
    }
}

fn required_name(name: &str) -> DomainResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name must not be blank"));
    }
    Ok(trimmed)
}
