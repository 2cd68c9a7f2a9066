use thiserror::Error;

use super::membership::{MembershipError, MembershipResolver};
use super::verifier::{CredentialVerifier, VerifiedCredential};
use crate::models::{Permission, Role};
use crate::store::StoreError;

/// Caller-visible outcome of a failed check. Verification and membership
/// details are logged, never carried here.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions for this project")]
    Unauthorized,

    /// The membership lookup itself failed; not a verdict on the caller
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identity admitted into a project-scoped operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub role: Role,
}

/// Authenticate, then authorize. Each step is usable on its own.
#[derive(Clone)]
pub struct PermissionGate {
    verifier: CredentialVerifier,
    resolver: MembershipResolver,
}

impl PermissionGate {
    pub fn new(verifier: CredentialVerifier, resolver: MembershipResolver) -> Self {
        Self { verifier, resolver }
    }

    pub fn resolver(&self) -> &MembershipResolver {
        &self.resolver
    }

    /// Identity only, no project scope
    pub fn authenticate(&self, credential: Option<&str>) -> Result<VerifiedCredential, GateError> {
        let Some(token) = credential else {
            tracing::debug!("Rejected request without bearer credential");
            return Err(GateError::Unauthenticated);
        };

        self.verifier.verify(token).map_err(|e| {
            tracing::warn!("Credential rejected: {}", e);
            GateError::Unauthenticated
        })
    }

    pub async fn authorize(
        &self,
        credential: Option<&str>,
        project_id: &str,
        required: &Permission,
    ) -> Result<Subject, GateError> {
        let verified = self.authenticate(credential)?;

        let role = match self.resolver.role_of(project_id, &verified.subject).await {
            Ok(role) => role,
            Err(MembershipError::ProjectNotFound(_)) => {
                tracing::warn!("Subject '{}' addressed unknown project '{}'", verified.subject, project_id);
                return Err(GateError::Unauthorized);
            }
            Err(MembershipError::Store(e)) => {
                tracing::error!("Membership lookup for project '{}' failed: {}", project_id, e);
                return Err(GateError::Store(e));
            }
        };

        if !role.satisfies(required) {
            tracing::warn!(
                "Subject '{}' with role '{}' denied on project '{}' (requires {:?})",
                verified.subject,
                role,
                project_id,
                required
            );
            return Err(GateError::Unauthorized);
        }

        tracing::debug!("Subject '{}' authorized on project '{}' as '{}'", verified.subject, project_id, role);
        Ok(Subject {
            id: verified.subject,
            role,
        })
    }
}
