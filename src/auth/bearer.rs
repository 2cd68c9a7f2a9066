use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::convert::Infallible;

/// Bearer token from the `Authorization` header, if one was sent.
///
/// Extraction never fails; handlers pass the value to the permission gate,
/// which decides what a missing or unusable credential means.
#[derive(Debug, Clone, Default)]
pub struct BearerCredential(pub Option<String>);

impl BearerCredential {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_bearer(&parts.headers)))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!("Ignoring Authorization header with scheme '{}'", scheme);
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
