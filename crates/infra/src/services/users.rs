//! Tenant user directory.

use tracing::info;

use propdesk_auth::{Principal, RoleSet};
use propdesk_core::{DomainError, DomainResult, UserId};
use propdesk_tenancy::User;

use crate::services::accounts::AccountService;
use crate::store::{StoreError, Stores};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub display_name: Option<String>,
    pub roles: RoleSet,
}

#[derive(Debug, Clone)]
pub struct UserService {
    stores: Stores,
    accounts: AccountService,
}

impl UserService {
    pub fn new(stores: Stores, accounts: AccountService) -> Self {
        Self { stores, accounts }
    }

    /// Users of the caller's tenant ordered by e-mail.
    pub async fn list(&self, principal: &Principal, active_only: bool) -> DomainResult<Vec<User>> {
        let mut users = self.stores.users.list(principal.tenant_id, active_only).await?;
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    pub async fn get(&self, principal: &Principal, id: UserId) -> DomainResult<User> {
        self.stores
            .users
            .get(principal.tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User {id} not found")))
    }

    /// `Conflict` when the e-mail is already registered in the tenant.
    pub async fn create(&self, principal: &Principal, new: NewUser) -> DomainResult<User> {
        let digest = self.accounts.hash(new.password).await?;
        let mut user = User::new(principal.tenant_id, &new.email, digest, new.full_name.trim(), new.roles);
        user.display_name = new.display_name.filter(|d| !d.trim().is_empty());
        self.stores.users.insert(user.clone()).await.map_err(|e| match e {
            StoreError::Duplicate(_) => DomainError::conflict(format!("E-mail '{}' is already registered", user.email)),
            other => other.into(),
        })?;
        info!(tenant_id = %principal.tenant_id, user_id = %user.id, "user created");
        Ok(user)
    }

    /// Replace the tenant-global roles wholesale.
    pub async fn set_roles(&self, principal: &Principal, id: UserId, roles: RoleSet) -> DomainResult<User> {
        let mut user = self.get(principal, id).await?;
        user.roles = roles;
        self.stores.users.update(principal.tenant_id, user.clone()).await?;
        Ok(user)
    }

    /// Soft delete. A caller cannot deactivate themselves.
    pub async fn deactivate(&self, principal: &Principal, id: UserId) -> DomainResult<User> {
        if id == principal.user_id {
            return Err(DomainError::conflict("You cannot deactivate your own account"));
        }
        let mut user = self.get(principal, id).await?;
        if user.active {
            user.active = false;
            self.stores.users.update(principal.tenant_id, user.clone()).await?;
            info!(tenant_id = %principal.tenant_id, user_id = %id, "user deactivated");
        }
        Ok(user)
    }
}
