use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{Value, json};

use propdesk_core::UserId;
use propdesk_infra::services::NewUser;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::extract::{CurrentPrincipal, QueryParams, ValidatedJson, parse_id};
use crate::app::services::AppServices;
use crate::authz::{RequirePolicy, policies};

pub fn router() -> Router {
    let admin = || RequirePolicy::new(policies::user_admin());

    Router::new()
        .route(
            "/api/users",
            get(list_users).route_layer(RequirePolicy::new(policies::user_directory())),
        )
        .route("/api/users", post(create_user).route_layer(admin()))
        .route("/api/users/:id", get(get_user).route_layer(admin()))
        .route("/api/users/:id/roles", put(set_roles).route_layer(admin()))
        .route("/api/users/:id/deactivate", post(deactivate).route_layer(admin()))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    QueryParams(query): QueryParams<dto::UserListQuery>,
) -> ApiResult<Json<Value>> {
    let items = services
        .users
        .list(&principal, query.active_only)
        .await?
        .iter()
        .map(dto::user_to_json)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "items": items })))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: UserId = parse_id(&id)?;
    let user = services.users.get(&principal, id).await?;
    Ok(Json(dto::user_to_json(&user)))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(body): ValidatedJson<dto::CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let roles = dto::role_set(&body.roles)?;
    let user = services
        .users
        .create(
            &principal,
            NewUser {
                email: body.email,
                password: body.password,
                full_name: body.full_name,
                display_name: body.display_name,
                roles,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dto::user_to_json(&user))))
}

pub async fn set_roles(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::SetRolesRequest>,
) -> ApiResult<Json<Value>> {
    let user = services
        .users
        .set_roles(&principal, parse_id(&id)?, dto::role_set(&body.roles)?)
        .await?;
    Ok(Json(dto::user_to_json(&user)))
}

pub async fn deactivate(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = services.users.deactivate(&principal, parse_id(&id)?).await?;
    Ok(Json(dto::user_to_json(&user)))
}
