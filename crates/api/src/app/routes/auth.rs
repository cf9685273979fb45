use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::post,
    Json, Router,
};

use propdesk_infra::services::SignupRequest;

use crate::app::dto::{self, TokenPairResponse};
use crate::app::errors::ApiResult;
use crate::app::extract::ValidatedJson;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/api/auth/signup-tenant", post(signup_tenant))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

pub async fn signup_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::SignupTenantRequest>,
) -> ApiResult<(StatusCode, Json<TokenPairResponse>)> {
    let outcome = services
        .accounts
        .signup_tenant(SignupRequest {
            tenant_name: body.tenant_name,
            tenant_slug: body.tenant_slug,
            admin_name: body.admin_name,
            admin_email: body.admin_email,
            admin_password: body.admin_password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.tokens.into())))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::LoginRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let pair = services
        .accounts
        .login(&body.tenant_slug, &body.email, &body.password)
        .await?;
    Ok(Json(pair.into()))
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::RefreshRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let pair = services.accounts.refresh(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::RefreshRequest>,
) -> ApiResult<StatusCode> {
    services.accounts.logout(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
