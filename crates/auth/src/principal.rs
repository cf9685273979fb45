use serde::{Deserialize, Serialize};

use propdesk_core::{CompanyId, TenantId, UserId};

use crate::{Role, RoleSet};

/// Resolved identity of the caller for one request.
///
/// Built from a verified access token and never persisted. `roles` are the
/// company-scoped roles when `company_id` is set, the tenant-global roles
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub roles: RoleSet,
    pub company_id: Option<CompanyId>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &RoleSet) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn has_all_roles(&self, roles: &RoleSet) -> bool {
        roles.is_subset(&self.roles)
    }

    pub fn has_selected_company(&self) -> bool {
        self.company_id.is_some()
    }
}
