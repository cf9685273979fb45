use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propdesk_auth::RoleSet;
use propdesk_core::{TenantId, UserId};

use crate::slug::normalize_email;

/// A login identity within one tenant.
///
/// `roles` are tenant-global; company-scoped roles live on
/// [`crate::CompanyMember`]. Users are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    /// Lower-cased; unique per tenant.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub display_name: Option<String>,
    pub roles: RoleSet,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        tenant_id: TenantId,
        email: &str,
        password_hash: String,
        full_name: impl Into<String>,
        roles: RoleSet,
    ) -> Self {
        Self {
            id: UserId::new(),
            tenant_id,
            email: normalize_email(email),
            password_hash,
            full_name: full_name.into(),
            display_name: None,
            roles,
            active: true,
            created_at: Utc::now(),
        }
    }
}
