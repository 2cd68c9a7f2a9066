use serde::{Deserialize, Serialize};

use super::validation::{require_text, ValidationErrors};
use super::Entity;
use crate::store::Collection;

pub const DEFAULT_USER_ROLE: &str = "developer";

/// Stored user document. Keyed by the credential subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Managed by the external credential service; never sent to clients
    #[serde(default, rename = "credentialHash", skip_serializing_if = "Option::is_none")]
    pub credential_hash: Option<String>,
    pub role: String,
    #[serde(default, rename = "projectIDs")]
    pub project_ids: Vec<String>,
}

impl User {
    pub fn new(subject: &str) -> Self {
        Self {
            id: subject.to_string(),
            name: subject.to_string(),
            credential_hash: None,
            role: DEFAULT_USER_ROLE.to_string(),
            project_ids: Vec::new(),
        }
    }
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;
    const READ_ONLY: &'static [&'static str] = &["id", "credentialHash", "projectIDs"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "id", &self.id, None);
        require_text(&mut errors, "name", &self.name, None);
        errors.into_result()
    }
}

/// Client-facing view of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(rename = "projectIDs")]
    pub project_ids: Vec<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
            project_ids: user.project_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_never_carries_the_credential_hash() {
        let mut user = User::new("alice");
        user.credential_hash = Some("$2b$10$abc".into());
        let profile = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(profile.get("credentialHash").is_none());
        assert_eq!(profile["role"], "developer");
    }
}
