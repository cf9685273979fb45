use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::{Value, json};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::CurrentPrincipal;
use crate::context;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ping", get(ping))
        .route("/api/me", get(me))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The caller as the server sees them; 401 when anonymous.
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    Json(dto::principal_to_json(&principal))
}

/// Router fallback for paths no route matches.
pub async fn not_found() -> ApiError {
    ApiError::NotFound(format!("No route for {}", context::current_path()))
}

/// Fallback for a known path called with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
