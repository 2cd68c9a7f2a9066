use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use thiserror::Error;

use super::{Claims, SigningKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential signature is invalid")]
    Invalid,

    #[error("credential expired at {expired_at}")]
    Expired { expired_at: i64 },

    #[error("credential is malformed: {0}")]
    Malformed(String),
}

/// Validates bearer tokens against the server key.
///
/// Pure function of (token, key, now): no I/O, no caching.
#[derive(Clone)]
pub struct CredentialVerifier {
    key: Arc<SigningKey>,
    leeway_secs: i64,
}

impl CredentialVerifier {
    pub fn new(key: Arc<SigningKey>) -> Self {
        Self { key, leeway_secs: 0 }
    }

    /// Allow tokens up to `secs` past their expiry
    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.leeway_secs = i64::try_from(secs).unwrap_or(i64::MAX);
        self
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedCredential, CredentialError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedCredential, CredentialError> {
        // Expiry is judged before the signature, so an expired token reports
        // Expired whether or not it was signed with our key.
        let unverified = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &Self::structural_validation())
            .map_err(|e| CredentialError::Malformed(e.to_string()))?
            .claims;

        if now.timestamp() >= unverified.exp.saturating_add(self.leeway_secs) {
            return Err(CredentialError::Expired {
                expired_at: unverified.exp,
            });
        }

        let claims = decode::<Claims>(token, self.key.decoding(), &Self::signed_validation())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => CredentialError::Invalid,
                _ => CredentialError::Malformed(e.to_string()),
            })?
            .claims;

        let subject = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CredentialError::Malformed("missing subject claim".to_string()))?;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| CredentialError::Malformed(format!("expiry {} out of range", claims.exp)))?;

        Ok(VerifiedCredential { subject, expires_at })
    }

    fn structural_validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }

    fn signed_validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry was already checked against the caller-supplied clock
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }
}
