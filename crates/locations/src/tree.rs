//! Nested view assembled from a flat list of locations.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use propdesk_core::LocationId;

use crate::Location;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub location: Location,
    pub children: Vec<TreeNode>,
}

/// Deterministic sibling order: name ignoring case, then exact name, then id.
pub fn sibling_order(a: &Location, b: &Location) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Group by parent and nest from the roots (`parent_id == None`).
///
/// Nodes whose parent is not in `locations` are left out, so a filtered input
/// (for example active nodes only) never produces a second root set.
pub fn build_tree(locations: Vec<Location>) -> Vec<TreeNode> {
    let mut by_parent: HashMap<Option<LocationId>, Vec<Location>> = HashMap::new();
    for loc in locations {
        by_parent.entry(loc.parent_id).or_default().push(loc);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(sibling_order);
    }
    assemble(None, &mut by_parent)
}

fn assemble(
    parent: Option<LocationId>,
    by_parent: &mut HashMap<Option<LocationId>, Vec<Location>>,
) -> Vec<TreeNode> {
    let Some(siblings) = by_parent.remove(&parent) else {
        return Vec::new();
    };
    siblings
        .into_iter()
        .map(|location| {
            let children = assemble(Some(location.id), by_parent);
            TreeNode { location, children }
        })
        .collect()
}
