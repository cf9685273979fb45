use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propdesk_auth::RoleSet;
use propdesk_core::{CompanyId, MemberId, TenantId, UserId};

/// Sub-organization within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Unique per tenant.
    pub slug: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: CompanyId::new(),
            tenant_id,
            name: name.into(),
            slug: slug.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// A user's company-scoped role set. Unique on `(company_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMember {
    pub id: MemberId,
    pub tenant_id: TenantId,
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub active: bool,
    pub roles: RoleSet,
}

impl CompanyMember {
    pub fn new(company: &Company, user_id: UserId, roles: RoleSet) -> Self {
        Self {
            id: MemberId::new(),
            tenant_id: company.tenant_id,
            company_id: company.id,
            user_id,
            active: true,
            roles,
        }
    }
}
