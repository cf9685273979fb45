use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use propdesk_auth::{AccessTokenCheck, TokenCodec};

use crate::app::errors::ApiError;
use crate::context::{self, RequestContext};

/// Paths a principal may reach before choosing a company.
pub const COMPANY_SELECTION_ALLOWLIST: &[&str] = &[
    "/health",
    "/api/ping",
    "/api/me",
    "/api/companies/mine",
    "/api/companies/select",
];

/// Prefixes exempt from company selection.
const COMPANY_SELECTION_ALLOWED_PREFIXES: &[&str] = &["/api/auth/"];

/// Resolve the caller from the bearer token.
///
/// Never rejects: a missing or unusable token yields an anonymous context and
/// authorization decides later. The context is bound for the rest of the
/// request and dropped with it.
pub async fn authenticate(
    State(codec): State<Arc<TokenCodec>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    let principal = bearer_token(req.headers()).and_then(|token| match codec.parse_access_token(token) {
        AccessTokenCheck::Valid(principal) => Some(principal),
        AccessTokenCheck::Invalid(reason) => {
            tracing::debug!(%path, %reason, "ignoring unusable access token");
            None
        }
    });

    let ctx = RequestContext { principal, path };
    req.extensions_mut().insert(ctx.clone());

    context::scope(ctx, next.run(req)).await
}

/// Reject company-less principals outside the allowlist with 409.
///
/// Anonymous requests pass through untouched.
pub async fn require_company_selection(req: Request, next: Next) -> Response {
    let unselected = req
        .extensions()
        .get::<RequestContext>()
        .and_then(|ctx| ctx.principal.as_ref())
        .is_some_and(|p| !p.has_selected_company());

    if unselected && !is_selection_exempt(req.uri().path()) {
        return ApiError::CompanySelectionRequired.into_response();
    }

    next.run(req).await
}

pub fn is_selection_exempt(path: &str) -> bool {
    COMPANY_SELECTION_ALLOWLIST.contains(&path)
        || COMPANY_SELECTION_ALLOWED_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
