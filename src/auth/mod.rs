pub mod bearer;
pub mod gate;
pub mod membership;
pub mod verifier;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bearer::BearerCredential;
pub use gate::{GateError, PermissionGate, Subject};
pub use membership::{MembershipError, MembershipResolver};
pub use verifier::{CredentialError, CredentialVerifier, VerifiedCredential};

/// Token payload. `sub` is optional here so a token without a subject
/// decodes and can be reported as malformed rather than as a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn new(subject: &str, now: DateTime<Utc>, ttl: Duration) -> Result<Self, TokenError> {
        let expires = now.checked_add_signed(ttl).ok_or(TokenError::LifetimeOutOfRange)?;
        Ok(Self {
            sub: Some(subject.to_string()),
            exp: expires.timestamp(),
            iat: now.timestamp(),
        })
    }
}

/// Process-wide HMAC key, built once at startup and never mutated
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Token lifetime is out of range")]
    LifetimeOutOfRange,
}

pub fn generate_jwt(key: &SigningKey, claims: &Claims) -> Result<String, TokenError> {
    encode(&Header::default(), claims, &key.encoding).map_err(|e| TokenError::Generation(e.to_string()))
}

/// Mint a token for `subject` valid for `ttl` from now
pub fn issue_token(key: &SigningKey, subject: &str, ttl: Duration) -> Result<String, TokenError> {
    generate_jwt(key, &Claims::new(subject, Utc::now(), ttl)?)
}
