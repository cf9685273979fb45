use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{Value, json};

use propdesk_core::{CompanyId, UserId};

use crate::app::dto::{self, AccessTokenResponse};
use crate::app::errors::ApiResult;
use crate::app::extract::{CurrentPrincipal, ValidatedJson, parse_id};
use crate::app::services::AppServices;
use crate::authz::{RequirePolicy, policies};

pub fn router() -> Router {
    let admin = || RequirePolicy::new(policies::company_admin());

    Router::new()
        .route("/api/companies/mine", get(my_companies))
        .route("/api/companies/select", post(select_company))
        .route("/api/companies", post(create_company).route_layer(admin()))
        .route(
            "/api/companies/:id/members",
            get(list_members).post(add_member).route_layer(admin()),
        )
        .route(
            "/api/companies/:id/members/:user_id/roles",
            put(set_member_roles).route_layer(admin()),
        )
        .route(
            "/api/companies/:id/members/:user_id/active",
            put(set_member_active).route_layer(admin()),
        )
}

pub async fn my_companies(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Value>> {
    let items = services
        .companies
        .my_companies(&principal)
        .await?
        .iter()
        .map(dto::membership_to_json)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "items": items })))
}

pub async fn select_company(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(body): ValidatedJson<dto::SelectCompanyRequest>,
) -> ApiResult<Json<AccessTokenResponse>> {
    let company_id: CompanyId = parse_id(&body.company_id)?;
    let access_token = services.companies.select_company(&principal, company_id).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

pub async fn create_company(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(body): ValidatedJson<dto::CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let company = services
        .companies
        .create_company(&principal, body.name.trim(), body.slug.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(dto::company_to_json(&company))))
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let company_id: CompanyId = parse_id(&id)?;
    let items = services
        .companies
        .list_members(&principal, company_id)
        .await?
        .iter()
        .map(dto::member_to_json)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "items": items })))
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let company_id: CompanyId = parse_id(&id)?;
    let user_id: UserId = parse_id(&body.user_id)?;
    let member = services
        .companies
        .add_member(&principal, company_id, user_id, dto::role_set(&body.roles)?)
        .await?;
    Ok((StatusCode::CREATED, Json(dto::member_to_json(&member))))
}

pub async fn set_member_roles(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((id, user_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<dto::SetRolesRequest>,
) -> ApiResult<Json<Value>> {
    let member = services
        .companies
        .set_member_roles(&principal, parse_id(&id)?, parse_id(&user_id)?, dto::role_set(&body.roles)?)
        .await?;
    Ok(Json(dto::member_to_json(&member)))
}

pub async fn set_member_active(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((id, user_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<dto::SetActiveRequest>,
) -> ApiResult<Json<Value>> {
    let member = services
        .companies
        .set_member_active(&principal, parse_id(&id)?, parse_id(&user_id)?, body.active)
        .await?;
    Ok(Json(dto::member_to_json(&member)))
}
