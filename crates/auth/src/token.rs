//! HS256 access/refresh token codec.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use propdesk_core::{CompanyId, TenantId, UserId};

use crate::claims::{AccessClaims, DecodedClaims, RefreshClaims, REFRESH_TOKEN_TYPE};
use crate::roles::{roles_from_csv, roles_to_csv};
use crate::{Principal, RoleSet};

/// Minimum signing secret length (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Token lifetimes, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSettings {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl_secs: 900,
            refresh_ttl_secs: 14 * 24 * 3600,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must be at least {MIN_SECRET_BYTES} bytes, got {0}")]
    WeakSecret(usize),

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is not a refresh token")]
    WrongType,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Why an access token was not accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Expired,
    BadSignature,
    Malformed,
    /// Signature-valid but lacks the access claims (e.g. a refresh token).
    NotAnAccessToken,
}

impl core::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            InvalidReason::Expired => "expired",
            InvalidReason::BadSignature => "bad_signature",
            InvalidReason::Malformed => "malformed",
            InvalidReason::NotAnAccessToken => "not_an_access_token",
        })
    }
}

/// Outcome of access token verification. Never an error: callers treat
/// `Invalid` as an anonymous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenCheck {
    Valid(Principal),
    Invalid(InvalidReason),
}

impl AccessTokenCheck {
    pub fn into_principal(self) -> Option<Principal> {
        match self {
            AccessTokenCheck::Valid(p) => Some(p),
            AccessTokenCheck::Invalid(_) => None,
        }
    }
}

/// Verified refresh token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub user_id: UserId,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed, time-limited tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    settings: TokenSettings,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl TokenCodec {
    /// Fails fast when the secret is shorter than 256 bits.
    pub fn new(secret: &[u8], settings: TokenSettings) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(TokenError::WeakSecret(secret.len()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            settings,
        })
    }

    pub fn settings(&self) -> TokenSettings {
        self.settings
    }

    pub fn issue_access_token(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        email: &str,
        roles: &RoleSet,
        company_id: Option<CompanyId>,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            tid: tenant_id.to_string(),
            email: email.to_string(),
            roles: roles_to_csv(roles),
            iat: now,
            exp: now + self.settings.access_ttl_secs,
            cid: company_id.map(|c| c.to_string()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            iat: now,
            exp: now + self.settings.refresh_ttl_secs,
            jti: Uuid::now_v7().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn parse_access_token(&self, token: &str) -> AccessTokenCheck {
        let claims = match self.decode(token) {
            Ok(c) => c,
            Err(TokenError::Expired) => return AccessTokenCheck::Invalid(InvalidReason::Expired),
            Err(TokenError::BadSignature) => {
                return AccessTokenCheck::Invalid(InvalidReason::BadSignature);
            }
            Err(_) => return AccessTokenCheck::Invalid(InvalidReason::Malformed),
        };

        if claims.token_type.as_deref() == Some(REFRESH_TOKEN_TYPE) {
            return AccessTokenCheck::Invalid(InvalidReason::NotAnAccessToken);
        }
        let (Some(tid), Some(email), Some(roles)) = (claims.tid, claims.email, claims.roles) else {
            return AccessTokenCheck::Invalid(InvalidReason::NotAnAccessToken);
        };

        let principal = (|| {
            Some(Principal {
                user_id: claims.sub.parse().ok()?,
                tenant_id: tid.parse().ok()?,
                email,
                roles: roles_from_csv(&roles).ok()?,
                company_id: match claims.cid {
                    Some(cid) => Some(cid.parse().ok()?),
                    None => None,
                },
            })
        })();

        match principal {
            Some(p) => AccessTokenCheck::Valid(p),
            None => AccessTokenCheck::Invalid(InvalidReason::Malformed),
        }
    }

    /// Unlike access parsing, misuse is a hard error here.
    pub fn parse_refresh_token(&self, token: &str) -> Result<RefreshGrant, TokenError> {
        let claims = self.decode(token)?;
        if claims.token_type.as_deref() != Some(REFRESH_TOKEN_TYPE) {
            return Err(TokenError::WrongType);
        }
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| TokenError::Malformed("sub is not a user id".into()))?;
        let jti = claims
            .jti
            .ok_or_else(|| TokenError::Malformed("missing jti".into()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Malformed("exp out of range".into()))?;
        Ok(RefreshGrant {
            user_id,
            jti,
            expires_at,
        })
    }

    fn decode(&self, token: &str) -> Result<DecodedClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<DecodedClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}
