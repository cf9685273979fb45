//! HTTP error taxonomy and the uniform JSON error envelope.
//!
//! Every failure leaves the API as
//! `{timestamp, status, error, message, path, validationErrors?}`; handlers
//! return [`ApiError`] and never build error bodies themselves.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use propdesk_core::DomainError;

use crate::context;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
    pub rejected_value: Value,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Company selection required")]
    CompanySelectionRequired,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Validation failed")]
    ValidationFailed(Vec<FieldViolation>),

    #[error("{0}")]
    BadRequest(String),

    /// Detail is logged, never returned.
    #[error("{0}")]
    Unexpected(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::CompanySelectionRequired | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ValidationFailed(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope body for `path`.
    pub fn envelope(&self, path: &str) -> Value {
        let status = self.status();
        let message = match self {
            ApiError::Unexpected(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
            "path": path,
        });
        if let ApiError::ValidationFailed(violations) = self {
            body["validationErrors"] = json!(violations);
        }
        body
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::BadRequest(msg),
            DomainError::Unauthenticated(msg) => ApiError::Unauthenticated(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Storage(msg) => ApiError::Unexpected(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let path = context::current_path();
        if let ApiError::Unexpected(detail) = &self {
            tracing::error!(%path, error = %detail, "unexpected error");
        }
        (self.status(), Json(self.envelope(&path))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_status_and_path() {
        let body = ApiError::NotFound("Location x not found".into()).envelope("/api/locations/x");
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["message"], "Location x not found");
        assert_eq!(body["path"], "/api/locations/x");
        assert!(body["timestamp"].is_string());
        assert!(body.get("validationErrors").is_none());
    }

    #[test]
    fn company_selection_is_a_conflict() {
        let err = ApiError::CompanySelectionRequired;
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.envelope("/api/users")["message"], "Company selection required");
    }

    #[test]
    fn method_not_allowed_has_an_envelope() {
        let body = ApiError::MethodNotAllowed.envelope("/health");
        assert_eq!(body["status"], 405);
        assert_eq!(body["error"], "Method Not Allowed");
        assert_eq!(body["path"], "/health");
    }

    #[test]
    fn unexpected_errors_hide_detail() {
        let body = ApiError::Unexpected("connection refused on 10.0.0.3".into()).envelope("/");
        assert_eq!(body["status"], 500);
        assert_eq!(body["message"], "An unexpected error occurred");
    }

    #[test]
    fn validation_lists_every_field() {
        let err = ApiError::ValidationFailed(vec![
            FieldViolation {
                field: "name".into(),
                message: "must not be blank".into(),
                rejected_value: json!(""),
            },
            FieldViolation {
                field: "roles".into(),
                message: "unknown role(s): ROOT".into(),
                rejected_value: json!(["ROOT"]),
            },
        ]);
        let body = err.envelope("/api/users");
        assert_eq!(body["status"], 400);
        let items = body["validationErrors"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["field"], "roles");
        assert_eq!(items[1]["rejectedValue"], json!(["ROOT"]));
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::unauthenticated("x"), StatusCode::UNAUTHORIZED),
            (DomainError::forbidden("x"), StatusCode::FORBIDDEN),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::storage("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
