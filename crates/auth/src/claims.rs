use serde::{Deserialize, Serialize};

/// Value of the `type` claim carried by refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Access token claims as written on issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user id.
    pub sub: String,
    /// Tenant id.
    pub tid: String,
    pub email: String,
    /// Comma-separated role names.
    pub roles: String,
    pub iat: i64,
    pub exp: i64,
    /// Selected company, present only on company-scoped tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Refresh token claims as written on issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, the key of the revocation list.
    pub jti: String,
}

/// Lenient view used when decoding: any signed token deserializes, and the
/// codec decides afterwards whether the claim set is acceptable.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DecodedClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}
