use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propdesk_core::TenantId;

/// Root of isolation. Created once at signup; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Globally unique.
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            slug: slug.into(),
            created_at: Utc::now(),
        }
    }
}
