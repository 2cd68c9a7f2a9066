use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::validation::{require_text, ValidationErrors};
use super::Entity;
use crate::store::Collection;

pub const OWNER_ROLE: &str = "owner";

/// Role reported for subjects that are not members of a project.
/// Never assignable, so no permission check can be satisfied by it.
pub const ANONYMOUS_ROLE: &str = "anonymous";

pub const PROJECT_NAME_MAX_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Member {
    pub id: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// A subject's role within one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Owner,
    Member(String),
    Anonymous,
}

impl Role {
    pub fn from_name(name: &str) -> Self {
        if name == OWNER_ROLE {
            Role::Owner
        } else {
            Role::Member(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => OWNER_ROLE,
            Role::Member(name) => name,
            Role::Anonymous => ANONYMOUS_ROLE,
        }
    }

    pub fn is_member(&self) -> bool {
        !matches!(self, Role::Anonymous)
    }

    /// Flat equality check against the required permission; there is no role hierarchy
    pub fn satisfies(&self, required: &Permission) -> bool {
        if !self.is_member() {
            return false;
        }
        match required {
            Permission::Role(role) => self.as_str() == role,
            Permission::AnyOf(roles) => roles.iter().any(|role| self.as_str() == role),
            Permission::Member => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a project-scoped operation requires of the caller's role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Exactly this role
    Role(String),
    /// Any of the enumerated roles, each compared exactly
    AnyOf(Vec<String>),
    /// Any membership at all
    Member,
}

impl Permission {
    pub fn owner() -> Self {
        Permission::Role(OWNER_ROLE.to_string())
    }
}

impl Project {
    pub fn new(id: String, name: String, owner: &str) -> Self {
        Self {
            id,
            name,
            owner: owner.to_string(),
            members: vec![Member {
                id: owner.to_string(),
                role: OWNER_ROLE.to_string(),
            }],
        }
    }

    /// Role of `subject` in this project, `Role::Anonymous` when not a member
    pub fn role_of(&self, subject: &str) -> Role {
        self.members
            .iter()
            .find(|member| member.id == subject)
            .map(|member| Role::from_name(&member.role))
            .unwrap_or(Role::Anonymous)
    }

    pub fn member(&self, subject: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == subject)
    }
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;
    const READ_ONLY: &'static [&'static str] = &["id", "owner", "members"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "name", &self.name, Some(PROJECT_NAME_MAX_LEN));
        require_text(&mut errors, "owner", &self.owner, None);

        let owners: Vec<&Member> = self.members.iter().filter(|m| m.role == OWNER_ROLE).collect();
        match owners.as_slice() {
            [only] if only.id == self.owner => {}
            _ => errors.add("members", "Exactly one member must be the owner"),
        }

        let mut seen = HashSet::new();
        if !self.members.iter().all(|m| seen.insert(m.id.as_str())) {
            errors.add("members", "Member ids must be unique");
        }
        if self.members.iter().any(|m| m.role == ANONYMOUS_ROLE || m.role.trim().is_empty()) {
            errors.add("members", "Member roles must be assignable");
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProject {
    pub name: String,
}

/// Body of an add-member request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMember {
    pub id: String,
    pub role: String,
}

impl NewMember {
    /// Owner is assigned only at creation and the anonymous sentinel never
    pub fn into_member(self) -> Result<Member, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "id", &self.id, None);
        let role = self.role.trim();
        if role.is_empty() {
            errors.add("role", "This field is required");
        } else if role.eq_ignore_ascii_case(OWNER_ROLE) || role.eq_ignore_ascii_case(ANONYMOUS_ROLE) {
            errors.add("role", format!("Role '{}' cannot be assigned", role));
        }
        errors.into_result()?;

        Ok(Member {
            id: self.id,
            role: role.to_string(),
        })
    }
}
