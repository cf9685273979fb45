//! Company membership and selection.
//!
//! Selection is a side channel to authentication: the caller already holds a
//! tenant-scoped token and trades it for one carrying `cid` and the
//! membership's roles.

use std::sync::Arc;

use tracing::{info, warn};

use propdesk_auth::{Principal, Role, RoleSet, TokenCodec};
use propdesk_core::{CompanyId, DomainError, DomainResult, TenantId, UserId};
use propdesk_tenancy::slug::{is_valid_slug, slug_candidates, slugify};
use propdesk_tenancy::{
    Company, CompanyMember, MembershipSummary, Tenant, User, check_selection, summarize_memberships,
};

use crate::store::{StoreError, Stores};

/// Slug probes before bootstrap gives up.
const MAX_SLUG_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrappedCompany {
    pub company_id: CompanyId,
    pub slug: String,
}

fn owner_roles() -> RoleSet {
    [Role::Owner, Role::Admin].into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct CompanyService {
    stores: Stores,
    codec: Arc<TokenCodec>,
}

impl CompanyService {
    pub fn new(stores: Stores, codec: Arc<TokenCodec>) -> Self {
        Self { stores, codec }
    }

    /// Create the tenant's first company, named after the tenant, and make
    /// `owner` an OWNER+ADMIN member.
    ///
    /// The slug is the tenant slug, or the first free `slug-N`.
    pub async fn bootstrap_default_company(
        &self,
        tenant: &Tenant,
        owner: &User,
    ) -> DomainResult<BootstrappedCompany> {
        let company = self.insert_with_free_slug(tenant.id, &tenant.name, &tenant.slug).await?;
        self.stores
            .members
            .insert(CompanyMember::new(&company, owner.id, owner_roles()))
            .await?;

        info!(tenant_id = %tenant.id, company_id = %company.id, slug = %company.slug, "default company bootstrapped");
        Ok(BootstrappedCompany {
            company_id: company.id,
            slug: company.slug,
        })
    }

    async fn insert_with_free_slug(&self, tenant_id: TenantId, name: &str, base: &str) -> DomainResult<Company> {
        for slug in slug_candidates(base).take(MAX_SLUG_ATTEMPTS) {
            if self.stores.companies.slug_exists(tenant_id, &slug).await? {
                continue;
            }
            let company = Company::new(tenant_id, name, slug);
            match self.stores.companies.insert(company.clone()).await {
                Ok(()) => return Ok(company),
                // Lost a race for this slug; try the next one.
                Err(StoreError::Duplicate(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(DomainError::conflict(format!("No free company slug derived from '{base}'")))
    }

    /// Companies the caller belongs to within their tenant, by name.
    pub async fn my_companies(&self, principal: &Principal) -> DomainResult<Vec<MembershipSummary>> {
        let members = self
            .stores
            .members
            .list_for_user(principal.tenant_id, principal.user_id)
            .await?;
        let mut pairs = Vec::with_capacity(members.len());
        for member in members {
            let company = self.stores.companies.get(principal.tenant_id, member.company_id).await?;
            pairs.push((member, company));
        }
        Ok(summarize_memberships(pairs))
    }

    /// Validate a switch to `company_id` and mint a company-scoped access
    /// token carrying the membership roles.
    pub async fn select_company(&self, principal: &Principal, company_id: CompanyId) -> DomainResult<String> {
        let company = self.load_company(principal.tenant_id, company_id).await?;
        let user = self.stores.users.get(principal.tenant_id, principal.user_id).await?;
        let member = self
            .stores
            .members
            .find(principal.tenant_id, company_id, principal.user_id)
            .await?;

        let roles = check_selection(principal.tenant_id, &company, user.as_ref(), member.as_ref())
            .inspect_err(|e| warn!(user_id = %principal.user_id, company_id = %company_id, error = %e, "company selection refused"))?;

        let token = self
            .codec
            .issue_access_token(principal.user_id, principal.tenant_id, &principal.email, &roles, Some(company_id))
            .map_err(|e| DomainError::storage(e.to_string()))?;
        info!(user_id = %principal.user_id, company_id = %company_id, "company selected");
        Ok(token)
    }

    /// New company in the caller's tenant; the caller becomes OWNER+ADMIN.
    ///
    /// Without an explicit slug one is derived from the name.
    pub async fn create_company(
        &self,
        principal: &Principal,
        name: &str,
        slug: Option<&str>,
    ) -> DomainResult<Company> {
        let slug = match slug {
            Some(s) if is_valid_slug(s) => s.to_string(),
            Some(s) => return Err(DomainError::validation(format!("invalid slug '{s}'"))),
            None => slugify(name),
        };
        if !is_valid_slug(&slug) {
            return Err(DomainError::validation(format!("cannot derive a slug from '{name}'")));
        }

        let company = Company::new(principal.tenant_id, name, slug);
        self.stores.companies.insert(company.clone()).await?;
        self.stores
            .members
            .insert(CompanyMember::new(&company, principal.user_id, owner_roles()))
            .await?;
        info!(tenant_id = %principal.tenant_id, company_id = %company.id, "company created");
        Ok(company)
    }

    pub async fn list_members(&self, principal: &Principal, company_id: CompanyId) -> DomainResult<Vec<CompanyMember>> {
        self.guard_managed_company(principal, company_id)?;
        self.load_company(principal.tenant_id, company_id).await?;
        Ok(self
            .stores
            .members
            .list_for_company(principal.tenant_id, company_id)
            .await?)
    }

    /// `Conflict` when the user is already a member.
    pub async fn add_member(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        user_id: UserId,
        roles: RoleSet,
    ) -> DomainResult<CompanyMember> {
        self.guard_managed_company(principal, company_id)?;
        let company = self.load_company(principal.tenant_id, company_id).await?;
        if self.stores.users.get(principal.tenant_id, user_id).await?.is_none() {
            return Err(DomainError::not_found(format!("User {user_id} not found")));
        }
        let member = CompanyMember::new(&company, user_id, roles);
        self.stores.members.insert(member.clone()).await?;
        info!(company_id = %company_id, user_id = %user_id, "member added");
        Ok(member)
    }

    /// Replace the member's roles wholesale.
    pub async fn set_member_roles(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        user_id: UserId,
        roles: RoleSet,
    ) -> DomainResult<CompanyMember> {
        let mut member = self.load_member(principal, company_id, user_id).await?;
        member.roles = roles;
        self.stores.members.update(principal.tenant_id, member.clone()).await?;
        Ok(member)
    }

    pub async fn set_member_active(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        user_id: UserId,
        active: bool,
    ) -> DomainResult<CompanyMember> {
        let mut member = self.load_member(principal, company_id, user_id).await?;
        member.active = active;
        self.stores.members.update(principal.tenant_id, member.clone()).await?;
        Ok(member)
    }

    async fn load_member(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        user_id: UserId,
    ) -> DomainResult<CompanyMember> {
        self.guard_managed_company(principal, company_id)?;
        self.load_company(principal.tenant_id, company_id).await?;
        self.stores
            .members
            .find(principal.tenant_id, company_id, user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User {user_id} is not a member of company {company_id}")))
    }

    /// Company-scoped roles only speak for the selected company.
    fn guard_managed_company(&self, principal: &Principal, company_id: CompanyId) -> DomainResult<()> {
        match principal.company_id {
            Some(selected) if selected != company_id => Err(DomainError::forbidden(
                "Select this company before managing its members",
            )),
            _ => Ok(()),
        }
    }

    /// NotFound when no tenant has the company, Forbidden when another does.
    async fn load_company(&self, tenant_id: TenantId, company_id: CompanyId) -> DomainResult<Company> {
        if let Some(company) = self.stores.companies.get(tenant_id, company_id).await? {
            return Ok(company);
        }
        match self.stores.companies.owner_of(company_id).await? {
            Some(_) => Err(DomainError::forbidden("Access to this company is denied")),
            None => Err(DomainError::not_found(format!("Company {company_id} not found"))),
        }
    }
}
