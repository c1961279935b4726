//! Bearer-token verification against the managed auth service's session JWTs.
//!
//! Session tokens are HS256-signed with the project's JWT secret. The
//! marketplace role lives in `user_metadata.role`; a top-level `role` claim is
//! accepted as a fallback. Tokens without a marketplace role still verify and
//! leave role resolution to the caller.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::domain::{Identity, Role, UserId};
use super::error::MarketError;

/// Resolves a bearer token to the calling user.
pub trait IdentityGate: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, MarketError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl SessionClaims {
    fn marketplace_role(&self) -> Option<Role> {
        self.user_metadata
            .role
            .as_deref()
            .and_then(Role::parse)
            .or_else(|| self.role.as_deref().and_then(Role::parse))
    }
}

/// HS256 session-token verifier.
pub struct JwtIdentityGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIdentityGate {
    pub fn new(secret: &[u8], audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint a session token for local tooling and tests.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, MarketError> {
        let claims = SessionClaims {
            sub: identity.id.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            role: None,
            user_metadata: UserMetadata {
                role: identity.role.map(|role| role.label().to_string()),
            },
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| MarketError::InvalidToken(format!("failed to sign session: {err}")))
    }
}

impl IdentityGate for JwtIdentityGate {
    fn verify(&self, token: &str) -> Result<Identity, MarketError> {
        if token.split('.').count() != 3 {
            return Err(MarketError::InvalidToken("token is malformed".to_string()));
        }

        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(
            |err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "session expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    ErrorKind::InvalidAudience => "token issued for another audience",
                    _ => "session is not valid",
                };
                MarketError::InvalidToken(reason.to_string())
            },
        )?;

        let id = UserId::parse(&data.claims.sub)
            .ok_or_else(|| MarketError::InvalidToken("subject is not a user id".to_string()))?;

        Ok(Identity {
            id,
            role: data.claims.marketplace_role(),
        })
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
