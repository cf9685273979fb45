//! Signup, login and refresh-token lifecycle.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use propdesk_auth::{PasswordHasher, Role, RoleSet, TokenCodec, TokenError};
use propdesk_core::{DomainError, DomainResult, TenantId};
use propdesk_tenancy::slug::{is_valid_slug, normalize_email};
use propdesk_tenancy::{Tenant, User};

use crate::services::companies::{BootstrappedCompany, CompanyService};
use crate::store::Stores;

/// The one message every failed login gets, whatever the cause.
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH: &str = "Invalid refresh token";
/// Verified against when the tenant or e-mail is unknown.
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a signup, for callers that need more than the tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub tenant: Tenant,
    pub admin: User,
    pub company: BootstrappedCompany,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AccountService {
    stores: Stores,
    codec: Arc<TokenCodec>,
    hasher: Arc<dyn PasswordHasher>,
    companies: CompanyService,
    /// Digest of [`DECOY_PASSWORD`], made by the configured hasher on first use.
    decoy_digest: Arc<OnceLock<String>>,
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(
        stores: Stores,
        codec: Arc<TokenCodec>,
        hasher: Arc<dyn PasswordHasher>,
        companies: CompanyService,
    ) -> Self {
        Self {
            stores,
            codec,
            hasher,
            companies,
            decoy_digest: Arc::new(OnceLock::new()),
        }
    }

    /// Create a tenant, its OWNER+ADMIN user and its default company, and
    /// log the new user in (unscoped token).
    pub async fn signup_tenant(&self, req: SignupRequest) -> DomainResult<SignupOutcome> {
        if !is_valid_slug(&req.tenant_slug) {
            return Err(DomainError::validation(format!("invalid tenant slug '{}'", req.tenant_slug)));
        }
        if self.stores.tenants.find_by_slug(&req.tenant_slug).await?.is_some() {
            return Err(DomainError::conflict(format!("Tenant slug '{}' is already taken", req.tenant_slug)));
        }

        let tenant = Tenant::new(req.tenant_name.trim(), req.tenant_slug.as_str());
        self.stores.tenants.insert(tenant.clone()).await?;

        let (admin, company) = match self.provision_owner(&tenant, req).await {
            Ok(provisioned) => provisioned,
            Err(e) => {
                warn!(tenant_id = %tenant.id, slug = %tenant.slug, error = %e, "signup failed, discarding tenant");
                self.discard_tenant(tenant.id).await;
                return Err(e);
            }
        };
        let tokens = self.issue_pair(&admin)?;

        info!(tenant_id = %tenant.id, user_id = %admin.id, slug = %tenant.slug, "tenant signed up");
        Ok(SignupOutcome {
            tenant,
            admin,
            company,
            tokens,
        })
    }

    async fn provision_owner(&self, tenant: &Tenant, req: SignupRequest) -> DomainResult<(User, BootstrappedCompany)> {
        let digest = self.hash(req.admin_password).await?;
        let roles: RoleSet = [Role::Owner, Role::Admin].into_iter().collect();
        let admin = User::new(tenant.id, &req.admin_email, digest, req.admin_name.trim(), roles);
        self.stores.users.insert(admin.clone()).await?;

        let company = self.companies.bootstrap_default_company(tenant, &admin).await?;
        Ok((admin, company))
    }

    /// Best-effort removal of a half-created tenant so its slug and owner
    /// e-mail can be used again.
    async fn discard_tenant(&self, tenant_id: TenantId) {
        if let Err(e) = self.remove_tenant_rows(tenant_id).await {
            warn!(tenant_id = %tenant_id, error = %e, "could not discard tenant after failed signup");
        }
    }

    async fn remove_tenant_rows(&self, tenant_id: TenantId) -> DomainResult<()> {
        for company in self.stores.companies.list(tenant_id).await? {
            self.stores.companies.delete(tenant_id, company.id).await?;
        }
        for user in self.stores.users.list(tenant_id, false).await? {
            self.stores.users.delete(tenant_id, user.id).await?;
        }
        self.stores.tenants.delete(tenant_id).await?;
        Ok(())
    }

    /// Every failure is the same `Unauthenticated`, so callers cannot probe
    /// which tenants or e-mails exist.
    pub async fn login(&self, tenant_slug: &str, email: &str, password: &str) -> DomainResult<TokenPair> {
        let Some(tenant) = self.stores.tenants.find_by_slug(tenant_slug).await? else {
            debug!(tenant_slug, "login for unknown tenant");
            self.verify_decoy(password.to_string()).await;
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        };
        let Some(user) = self
            .stores
            .users
            .find_by_email(tenant.id, &normalize_email(email))
            .await?
        else {
            debug!(tenant_id = %tenant.id, "login for unknown e-mail");
            self.verify_decoy(password.to_string()).await;
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        };

        let verified = self.verify(password.to_string(), user.password_hash.clone()).await;
        if !matches!(verified, Ok(true)) || !user.active {
            if let Err(e) = verified {
                warn!(user_id = %user.id, error = %e, "stored password hash unusable");
            }
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        }

        info!(tenant_id = %tenant.id, user_id = %user.id, "user logged in");
        self.issue_pair(&user)
    }

    /// Rotate a refresh token: the presented one is revoked and a fresh pair
    /// issued. The new access token is unscoped; the caller reselects a
    /// company.
    ///
    /// Revoking is the spend: of two concurrent redemptions of one token only
    /// the one that revokes it gets a pair.
    pub async fn refresh(&self, refresh_token: &str) -> DomainResult<TokenPair> {
        let grant = self.codec.parse_refresh_token(refresh_token).map_err(refresh_error)?;
        if !self.stores.revocations.revoke(&grant.jti, grant.expires_at).await? {
            warn!(user_id = %grant.user_id, "revoked refresh token presented");
            return Err(DomainError::unauthenticated(INVALID_REFRESH));
        }
        let user = match self.stores.users.resolve_identity(grant.user_id).await? {
            Some(u) if u.active => u,
            _ => return Err(DomainError::unauthenticated(INVALID_REFRESH)),
        };

        debug!(user_id = %user.id, "refresh token rotated");
        self.issue_pair(&user)
    }

    /// Revoke a refresh token. Revoking twice is harmless.
    pub async fn logout(&self, refresh_token: &str) -> DomainResult<()> {
        let grant = self.codec.parse_refresh_token(refresh_token).map_err(refresh_error)?;
        self.stores.revocations.revoke(&grant.jti, grant.expires_at).await?;
        info!(user_id = %grant.user_id, "user logged out");
        Ok(())
    }

    pub(crate) async fn hash(&self, plaintext: String) -> DomainResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| DomainError::storage(format!("hashing task failed: {e}")))?
            .map_err(|e| DomainError::storage(e.to_string()))
    }

    async fn verify(&self, plaintext: String, digest: String) -> DomainResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| DomainError::storage(format!("hashing task failed: {e}")))?
            .map_err(|e| DomainError::storage(e.to_string()))
    }

    /// Spend the same hashing work as a real check, so a miss takes as long
    /// as a wrong password.
    async fn verify_decoy(&self, plaintext: String) {
        let hasher = self.hasher.clone();
        let decoy = self.decoy_digest.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let digest = match decoy.get() {
                Some(d) => d,
                None => {
                    let fresh = hasher.hash(DECOY_PASSWORD)?;
                    decoy.get_or_init(|| fresh)
                }
            };
            hasher.verify(&plaintext, digest)
        })
        .await;
        if let Ok(Err(e)) = outcome {
            debug!(error = %e, "decoy verification failed");
        }
    }

    fn issue_pair(&self, user: &User) -> DomainResult<TokenPair> {
        let access_token = self
            .codec
            .issue_access_token(user.id, user.tenant_id, &user.email, &user.roles, None)
            .map_err(|e| DomainError::storage(e.to_string()))?;
        let refresh_token = self
            .codec
            .issue_refresh_token(user.id)
            .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn refresh_error(err: TokenError) -> DomainError {
    debug!(error = %err, "refresh token rejected");
    DomainError::unauthenticated(INVALID_REFRESH)
}
