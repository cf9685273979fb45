//! HTTP routes, one file per area. Paths are absolute so that the request
//! path seen by the gates matches the one the client sent.

use axum::Router;

pub mod auth;
pub mod companies;
pub mod locations;
pub mod system;
pub mod users;

pub fn router() -> Router {
    Router::new()
        .merge(system::router())
        .merge(auth::router())
        .merge(companies::router())
        .merge(users::router())
        .merge(locations::router())
        .fallback(system::not_found)
        .method_not_allowed_fallback(system::method_not_allowed)
}
