//! Route-level authorization.
//!
//! [`RequirePolicy`] wraps a route with a [`Policy`] and evaluates it against
//! the request's [`RequestContext`] and query parameters before the handler
//! runs. No principal answers 401, an insufficient one 403. Handlers only
//! run once the policy allows.
//!
//! ```ignore
//! Router::new()
//!     .route("/api/users", get(list_users).route_layer(RequirePolicy::new(policies::user_directory())))
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Query;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use propdesk_auth::{Decision, Denial, Policy, RequestFacts};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

/// Policies attached to the routes.
pub mod policies {
    use propdesk_auth::Role;
    use propdesk_auth::policy::{Policy, any_role, authenticated, param_equals};

    pub fn location_read() -> Policy {
        authenticated()
    }

    pub fn location_write() -> Policy {
        any_role([Role::Owner, Role::Admin, Role::Manager])
    }

    pub fn location_delete() -> Policy {
        any_role([Role::Owner, Role::Admin])
    }

    /// Admins see everybody; managers only the active directory.
    pub fn user_directory() -> Policy {
        any_role([Role::Owner, Role::Admin])
            .or(any_role([Role::Manager]).and(param_equals("activeOnly", "true")))
    }

    pub fn user_admin() -> Policy {
        any_role([Role::Owner, Role::Admin])
    }

    pub fn company_admin() -> Policy {
        any_role([Role::Owner, Role::Admin])
    }
}

#[derive(Debug, Clone)]
pub struct RequirePolicy {
    policy: Arc<Policy>,
}

impl RequirePolicy {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for RequirePolicy {
    type Service = RequirePolicyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePolicyService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequirePolicyService<S> {
    inner: S,
    policy: Arc<Policy>,
}

type BoxResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;

impl<S> Service<Request<Body>> for RequirePolicyService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let principal = req
            .extensions()
            .get::<RequestContext>()
            .and_then(|ctx| ctx.principal.clone());
        let facts = request_facts(&req);

        match self.policy.evaluate(principal.as_ref(), &facts) {
            Decision::Allow => Box::pin(self.inner.call(req)),
            Decision::Deny(Denial::Unauthenticated) => {
                tracing::debug!(path = %req.uri().path(), policy = %self.policy, "denied: not authenticated");
                rejected(ApiError::Unauthenticated("Authentication required".into()))
            }
            Decision::Deny(Denial::Forbidden) => {
                if let Some(p) = &principal {
                    tracing::warn!(
                        user_id = %p.user_id,
                        tenant_id = %p.tenant_id,
                        path = %req.uri().path(),
                        policy = %self.policy,
                        "denied: insufficient role"
                    );
                }
                rejected(ApiError::Forbidden("Access denied".into()))
            }
        }
    }
}

fn rejected<E: Send + 'static>(err: ApiError) -> BoxResponseFuture<E> {
    Box::pin(std::future::ready(Ok(err.into_response())))
}

/// Query parameters as policy facts. An unparsable query yields no facts.
fn request_facts(req: &Request<Body>) -> RequestFacts {
    Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(params)| RequestFacts::new(params))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use axum::http::StatusCode;
    use propdesk_auth::{Principal, Role, RoleSet};
    use propdesk_core::{CompanyId, TenantId, UserId};
    use tower::{ServiceExt, service_fn};

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            user_id: UserId::new(),
            tenant_id: TenantId::new(),
            email: "m@test".into(),
            roles: roles.iter().copied().collect::<RoleSet>(),
            company_id: Some(CompanyId::new()),
        }
    }

    fn request(uri: &str, principal: Option<Principal>) -> Request<Body> {
        let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        req.extensions_mut().insert(RequestContext {
            principal,
            path: uri.into(),
        });
        req
    }

    async fn status_of(policy: Policy, req: Request<Body>) -> StatusCode {
        let inner = service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        });
        let svc = RequirePolicy::new(policy).layer(inner);
        svc.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn anonymous_is_unauthorized() {
        let status = status_of(policies::location_read(), request("/api/locations", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn viewer_may_read_but_not_write() {
        let viewer = principal(&[Role::Viewer]);
        let read = status_of(policies::location_read(), request("/api/locations", Some(viewer.clone()))).await;
        let write = status_of(policies::location_write(), request("/api/locations", Some(viewer))).await;
        assert_eq!(read, StatusCode::OK);
        assert_eq!(write, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn manager_directory_depends_on_active_only() {
        let manager = principal(&[Role::Manager]);
        let all = status_of(
            policies::user_directory(),
            request("/api/users?activeOnly=false", Some(manager.clone())),
        )
        .await;
        let active = status_of(
            policies::user_directory(),
            request("/api/users?activeOnly=true", Some(manager)),
        )
        .await;
        assert_eq!(all, StatusCode::FORBIDDEN);
        assert_eq!(active, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_directory_needs_no_flag() {
        let admin = principal(&[Role::Admin]);
        let status = status_of(policies::user_directory(), request("/api/users", Some(admin))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn manager_cannot_delete_locations() {
        let manager = principal(&[Role::Manager]);
        let status = status_of(policies::location_delete(), request("/api/locations/x", Some(manager))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
