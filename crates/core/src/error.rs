//! Domain error model.

use thiserror::Error;

/// Result type used across the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant maps onto exactly one HTTP status at the API boundary; the
/// API layer never inspects message text to decide the status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The caller presented no usable credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller is known but may not perform the operation, or the target
    /// belongs to another tenant.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A tenant-local entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, cyclic reparent, delete blocked by children.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed. Never shown verbatim to callers.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
