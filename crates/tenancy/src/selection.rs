//! Company membership rules that need no storage.

use propdesk_auth::RoleSet;
use propdesk_core::{CompanyId, DomainError, DomainResult, TenantId};

use crate::{Company, CompanyMember, User};

/// One row of "which companies may I act as".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSummary {
    pub company_id: CompanyId,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub member_active: bool,
    pub roles: RoleSet,
}

/// Pair memberships with their companies, dropping memberships whose company
/// no longer exists, sorted by company name case-insensitively.
pub fn summarize_memberships<I>(pairs: I) -> Vec<MembershipSummary>
where
    I: IntoIterator<Item = (CompanyMember, Option<Company>)>,
{
    let mut out: Vec<MembershipSummary> = pairs
        .into_iter()
        .filter_map(|(member, company)| {
            let company = company?;
            Some(MembershipSummary {
                company_id: company.id,
                name: company.name,
                slug: company.slug,
                active: company.active,
                member_active: member.active,
                roles: member.roles,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.company_id.cmp(&b.company_id))
    });
    out
}

/// Validate a company switch for a caller in `tenant_id`, returning the
/// company-scoped roles the new token must carry.
///
/// Checks run in a fixed order and every failure is `Forbidden`; the caller
/// has already established that the company exists.
pub fn check_selection(
    tenant_id: TenantId,
    company: &Company,
    user: Option<&User>,
    member: Option<&CompanyMember>,
) -> DomainResult<RoleSet> {
    if company.tenant_id != tenant_id {
        return Err(DomainError::forbidden("Access to this company is denied"));
    }
    if !company.active {
        return Err(DomainError::forbidden("Company is inactive"));
    }
    let Some(member) = member.filter(|m| m.company_id == company.id && m.tenant_id == tenant_id) else {
        return Err(DomainError::forbidden("User is not a member of this company"));
    };
    if !user.is_some_and(|u| u.active && u.id == member.user_id) {
        return Err(DomainError::forbidden("User account is inactive"));
    }
    if !member.active {
        return Err(DomainError::forbidden("Company membership is inactive"));
    }
    Ok(member.roles.clone())
}
