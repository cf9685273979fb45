//! Per-request identity context.
//!
//! The [`RequestContext`] travels with the request as an axum extension, and
//! is also bound to a tokio task-local for the duration of the request so
//! that code without access to the request (the error envelope, helpers deep
//! in a handler) can read it. The binding is dropped when the scoped future
//! completes, fails or unwinds; nothing survives into the next request on
//! the same worker.

use std::future::Future;

use propdesk_auth::Principal;
use propdesk_core::TenantId;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Identity and location of the request being served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub path: String,
}

impl RequestContext {
    pub fn anonymous(path: impl Into<String>) -> Self {
        Self {
            principal: None,
            path: path.into(),
        }
    }

    pub fn authenticated(principal: Principal, path: impl Into<String>) -> Self {
        Self {
            principal: Some(principal),
            path: path.into(),
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.principal.as_ref().map(|p| p.tenant_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// Run `fut` with `ctx` bound as the current context.
pub async fn scope<F: Future>(ctx: RequestContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

/// Run `fut` as `principal`, outside of any HTTP request (seeding, jobs).
pub async fn with_user<F: Future>(principal: Principal, fut: F) -> F::Output {
    scope(RequestContext::authenticated(principal, String::new()), fut).await
}

pub fn current() -> Option<RequestContext> {
    CURRENT.try_with(Clone::clone).ok()
}

pub fn current_principal() -> Option<Principal> {
    CURRENT.try_with(|c| c.principal.clone()).ok().flatten()
}

/// Request path of the current context, empty outside a request.
pub fn current_path() -> String {
    CURRENT.try_with(|c| c.path.clone()).unwrap_or_default()
}
