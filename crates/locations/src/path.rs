//! Materialized path arithmetic.
//!
//! A path is `/` followed by ancestor ids from the root down to the node
//! itself, separated by `/`. All functions here are total over arbitrary
//! strings; they never panic on malformed input.

use propdesk_core::{DomainError, DomainResult, LocationId};

pub const SEPARATOR: char = '/';

/// Path of a node whose parent has `parent_path`, or of a root when `None`.
pub fn path_for(parent_path: Option<&str>, id: LocationId) -> String {
    match parent_path {
        Some(parent) => format!("{parent}{SEPARATOR}{id}"),
        None => format!("{SEPARATOR}{id}"),
    }
}

/// `true` when `path` is `ancestor` itself or lies below it.
///
/// Matches whole segments only: `/a/bc` is not within `/a/b`.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// `true` when `path` lies strictly below `ancestor`.
pub fn is_strict_descendant(path: &str, ancestor: &str) -> bool {
    path != ancestor && is_within(path, ancestor)
}

/// Replace the `old_prefix` of `path` by `new_prefix`.
///
/// Returns `None` when `path` is not within `old_prefix`, so callers cannot
/// accidentally rewrite a node outside the moved subtree.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_within(path, old_prefix) {
        return None;
    }
    let mut out = String::with_capacity(path.len() - old_prefix.len() + new_prefix.len());
    out.push_str(new_prefix);
    out.push_str(&path[old_prefix.len()..]);
    Some(out)
}

/// Number of segments, 1 for a root.
pub fn depth(path: &str) -> usize {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).count()
}

/// Parse every segment into an id, root first.
pub fn ancestry(path: &str) -> DomainResult<Vec<LocationId>> {
    let body = path
        .strip_prefix(SEPARATOR)
        .ok_or_else(|| DomainError::validation(format!("path must start with '{SEPARATOR}': {path}")))?;
    body.split(SEPARATOR).map(str::parse).collect()
}
