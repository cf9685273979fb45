use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::{Validate, ValidationError};

use propdesk_auth::roles::{parse_roles, unknown_role_names};
use propdesk_auth::{Principal, RoleSet};
use propdesk_infra::services::TokenPair;
use propdesk_locations::{LocationFilter, LocationType};
use propdesk_tenancy::{Company, CompanyMember, MembershipSummary, User};

use crate::app::errors::ApiError;
use crate::app::extract::parse_id;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupTenantRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub tenant_name: String,
    #[validate(
        length(min = 2, max = 63, message = "must be between 2 and 63 characters"),
        regex(path = *SLUG_RE, message = "must be lower-case letters, digits and single hyphens")
    )]
    pub tenant_slug: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub admin_name: String,
    #[validate(email(message = "must be a valid e-mail address"))]
    pub admin_email: String,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub admin_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub tenant_slug: String,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectCompanyRequest {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub company_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(
        length(min = 2, max = 63, message = "must be between 2 and 63 characters"),
        regex(path = *SLUG_RE, message = "must be lower-case letters, digits and single hyphens")
    )]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub user_id: String,
    #[validate(custom(function = "known_roles"))]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetRolesRequest {
    #[validate(custom(function = "known_roles"))]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid e-mail address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub full_name: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub display_name: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "known_roles"))]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub parent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearchQuery {
    #[serde(rename = "type")]
    pub location_type: Option<String>,
    pub parent_id: Option<String>,
    pub active: Option<bool>,
    pub q: Option<String>,
}

impl LocationSearchQuery {
    pub fn into_filter(self) -> Result<LocationFilter, ApiError> {
        Ok(LocationFilter {
            location_type: self
                .location_type
                .as_deref()
                .map(str::parse::<LocationType>)
                .transpose()?,
            parent_id: self.parent_id.as_deref().map(parse_id).transpose()?,
            active: self.active,
            q: self.q,
        })
    }
}

fn known_roles(names: &[String]) -> Result<(), ValidationError> {
    let unknown = unknown_role_names(names);
    if unknown.is_empty() {
        return Ok(());
    }
    let mut err = ValidationError::new("unknown_role");
    err.message = Some(format!("unknown role(s): {}", unknown.join(", ")).into());
    err.add_param("value".into(), &names);
    Err(err)
}

/// Role names that already passed [`known_roles`].
pub fn role_set(names: &[String]) -> Result<RoleSet, ApiError> {
    parse_roles(names).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

pub fn principal_to_json(p: &Principal) -> Value {
    json!({
        "userId": p.user_id.to_string(),
        "tenantId": p.tenant_id.to_string(),
        "email": p.email,
        "roles": p.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "companyId": p.company_id.map(|c| c.to_string()),
    })
}

pub fn user_to_json(u: &User) -> Value {
    json!({
        "id": u.id.to_string(),
        "email": u.email,
        "fullName": u.full_name,
        "displayName": u.display_name,
        "roles": u.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "active": u.active,
        "createdAt": u.created_at.to_rfc3339(),
    })
}

pub fn membership_to_json(m: &MembershipSummary) -> Value {
    json!({
        "companyId": m.company_id.to_string(),
        "name": m.name,
        "slug": m.slug,
        "active": m.active,
        "memberActive": m.member_active,
        "roles": m.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    })
}

pub fn company_to_json(c: &Company) -> Value {
    json!({
        "id": c.id.to_string(),
        "name": c.name,
        "slug": c.slug,
        "active": c.active,
        "createdAt": c.created_at.to_rfc3339(),
    })
}

pub fn member_to_json(m: &CompanyMember) -> Value {
    json!({
        "id": m.id.to_string(),
        "companyId": m.company_id.to_string(),
        "userId": m.user_id.to_string(),
        "active": m.active,
        "roles": m.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    })
}
