use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propdesk_core::{DomainError, DomainResult, LocationId, TenantId};

use crate::path;

/// Kind of physical place a location node represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Site,
    Building,
    Floor,
    Room,
    Area,
    Zone,
    Other,
}

impl LocationType {
    pub const ALL: [LocationType; 7] = [
        LocationType::Site,
        LocationType::Building,
        LocationType::Floor,
        LocationType::Room,
        LocationType::Area,
        LocationType::Zone,
        LocationType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Site => "SITE",
            LocationType::Building => "BUILDING",
            LocationType::Floor => "FLOOR",
            LocationType::Room => "ROOM",
            LocationType::Area => "AREA",
            LocationType::Zone => "ZONE",
            LocationType::Other => "OTHER",
        }
    }
}

impl core::fmt::Display for LocationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the wire name, ignoring ASCII case (query strings are lenient).
impl core::str::FromStr for LocationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LocationType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown location type: {s}")))
    }
}

/// A node of a tenant's location tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub parent_id: Option<LocationId>,
    /// `/rootId/.../id`, always ending with `id`.
    pub path: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    /// Build a new node with a pre-generated id and its final path.
    ///
    /// `parent` must belong to the same tenant.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        location_type: LocationType,
        parent: Option<&Location>,
    ) -> DomainResult<Self> {
        if let Some(p) = parent {
            if p.tenant_id != tenant_id {
                return Err(DomainError::not_found(format!("Location {} not found", p.id)));
            }
        }
        let id = LocationId::new();
        let now = Utc::now();
        Ok(Self {
            id,
            tenant_id,
            name: name.into(),
            location_type,
            parent_id: parent.map(|p| p.id),
            path: path::path_for(parent.map(|p| p.path.as_str()), id),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn depth(&self) -> usize {
        path::depth(&self.path)
    }

    /// `true` when `other` is this node or sits anywhere below it.
    pub fn contains(&self, other: &Location) -> bool {
        path::is_within(&other.path, &self.path)
    }
}

/// Validate a reparent of `node` under `new_parent` and return its new path.
///
/// Self-parenting and moving a node below its own descendant are conflicts;
/// in both cases nothing has been changed yet.
pub fn plan_move(node: &Location, new_parent: Option<&Location>) -> DomainResult<String> {
    let Some(parent) = new_parent else {
        return Ok(path::path_for(None, node.id));
    };
    if parent.id == node.id {
        return Err(DomainError::conflict("Location cannot be its own parent"));
    }
    if parent.tenant_id != node.tenant_id {
        return Err(DomainError::not_found(format!("Location {} not found", parent.id)));
    }
    if node.contains(parent) {
        return Err(DomainError::conflict(
            "Location cannot be moved under one of its own descendants",
        ));
    }
    Ok(path::path_for(Some(&parent.path), node.id))
}
