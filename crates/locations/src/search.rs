use serde::{Deserialize, Serialize};

use propdesk_core::LocationId;

use crate::{Location, LocationType};

/// Optional, AND-combined predicates for a location search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub location_type: Option<LocationType>,
    pub parent_id: Option<LocationId>,
    pub active: Option<bool>,
    /// Case-insensitive substring of the name.
    pub q: Option<String>,
}

impl LocationFilter {
    pub fn matches(&self, loc: &Location) -> bool {
        self.location_type.is_none_or(|t| loc.location_type == t)
            && self.parent_id.is_none_or(|p| loc.parent_id == Some(p))
            && self.active.is_none_or(|a| loc.active == a)
            && self.name_matches(&loc.name)
    }

    fn name_matches(&self, name: &str) -> bool {
        match self.q.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => name.to_lowercase().contains(&q.to_lowercase()),
        }
    }
}
