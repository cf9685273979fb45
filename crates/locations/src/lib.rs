//! Location hierarchy domain module.
//!
//! Locations form one tree per tenant. Every node carries a materialized path
//! (`/rootId/.../selfId`) so subtree queries are prefix matches. This crate is
//! pure: path arithmetic, move planning and tree assembly, no storage.

pub mod location;
pub mod path;
pub mod search;
pub mod tree;

pub use location::{Location, LocationType, plan_move};
pub use search::LocationFilter;
pub use tree::{TreeNode, build_tree, sibling_order};
