use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{Value, json};

use propdesk_core::LocationId;
use propdesk_infra::services::LocationInput;
use propdesk_locations::{Location, TreeNode};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::extract::{CurrentPrincipal, QueryParams, ValidatedJson, parse_id};
use crate::app::services::AppServices;
use crate::authz::{RequirePolicy, policies};

pub fn router() -> Router {
    let read = || RequirePolicy::new(policies::location_read());
    let write = || RequirePolicy::new(policies::location_write());

    Router::new()
        .route("/api/locations", get(search_locations).route_layer(read()))
        .route("/api/locations", post(create_location).route_layer(write()))
        .route("/api/locations/tree", get(location_tree).route_layer(read()))
        .route("/api/locations/:id", get(get_location).route_layer(read()))
        .route("/api/locations/:id", put(update_location).route_layer(write()))
        .route(
            "/api/locations/:id",
            delete(delete_location).route_layer(RequirePolicy::new(policies::location_delete())),
        )
        .route("/api/locations/:id/descendants", get(descendants).route_layer(read()))
        .route("/api/locations/:id/active", put(set_active).route_layer(write()))
}

pub async fn search_locations(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    QueryParams(query): QueryParams<dto::LocationSearchQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.into_filter()?;
    let items = services.locations.search(&principal, &filter).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(body): ValidatedJson<dto::LocationRequest>,
) -> ApiResult<(StatusCode, Json<Location>)> {
    let input = location_input(body)?;
    let location = services.locations.create(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn location_tree(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<TreeNode>>> {
    Ok(Json(services.locations.tree(&principal).await?))
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Location>> {
    let id: LocationId = parse_id(&id)?;
    Ok(Json(services.locations.get(&principal, id).await?))
}

pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::LocationRequest>,
) -> ApiResult<Json<Location>> {
    let id: LocationId = parse_id(&id)?;
    let input = location_input(body)?;
    Ok(Json(services.locations.update(&principal, id, input).await?))
}

pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: LocationId = parse_id(&id)?;
    services.locations.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn descendants(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: LocationId = parse_id(&id)?;
    let items = services.locations.descendants(&principal, id).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::SetActiveRequest>,
) -> ApiResult<Json<Location>> {
    let id: LocationId = parse_id(&id)?;
    Ok(Json(services.locations.set_active(&principal, id, body.active).await?))
}

fn location_input(body: dto::LocationRequest) -> ApiResult<LocationInput> {
    Ok(LocationInput {
        name: body.name,
        location_type: body.location_type,
        parent_id: body.parent_id.as_deref().map(parse_id).transpose()?,
    })
}
