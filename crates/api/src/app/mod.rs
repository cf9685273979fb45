//! HTTP API application wiring (axum router + service wiring).
//!
//! - `services.rs`: stores, token codec and application services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `extract.rs`: principal, validated JSON and query extractors
//! - `errors.rs`: the error envelope

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Every request passes, in order: tracing span, authentication gate,
/// company selection gate, the route's policy, then the handler.
pub fn build_app(services: AppServices) -> Router {
    let codec = services.codec.clone();

    routes::router()
        .layer(axum::middleware::from_fn(middleware::require_company_selection))
        .layer(axum::middleware::from_fn_with_state(codec, middleware::authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(services)))
}
