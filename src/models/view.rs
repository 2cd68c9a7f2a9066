use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::validation::{require_text, ValidationErrors};
use super::Entity;
use crate::store::Collection;

pub const VIEW_NAME_MAX_LEN: usize = 30;

/// Architectural perspective of a view or component.
///
/// Closed set: unknown values fail to decode instead of falling back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    UserStory,
    Functional,
    Development,
    None,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [ViewKind::UserStory, ViewKind::Functional, ViewKind::Development, ViewKind::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::UserStory => "userStory",
            ViewKind::Functional => "functional",
            ViewKind::Development => "development",
            ViewKind::None => "none",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationErrors::single("kind", format!("unknown kind '{}'", s)))
    }
}

/// A named grouping of components; the authoritative index of its components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchView {
    pub id: String,
    pub name: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub kind: ViewKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: Vec<String>,
}

impl Entity for ArchView {
    const COLLECTION: Collection = Collection::Views;
    const READ_ONLY: &'static [&'static str] = &["id", "projectID", "components"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "id", &self.id, None);
        require_text(&mut errors, "name", &self.name, Some(VIEW_NAME_MAX_LEN));
        require_text(&mut errors, "projectID", &self.project_id, None);

        let mut seen = HashSet::new();
        if !self.components.iter().all(|id| seen.insert(id.as_str())) {
            errors.add("components", "Component ids must be unique");
        }

        errors.into_result()
    }
}

/// Body of a create-view request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewView {
    pub name: String,
    pub kind: ViewKind,
    #[serde(default)]
    pub description: String,
    /// Optional echo of the route's project; must match when present
    #[serde(default, rename = "projectID")]
    pub project_id: Option<String>,
}

impl NewView {
    /// Build the stored view with a fresh identity and an empty component list
    pub fn into_view(self, id: String, project_id: &str) -> Result<ArchView, ValidationErrors> {
        if let Some(body_project) = &self.project_id {
            if body_project != project_id {
                return Err(ValidationErrors::single("projectID", "Does not match the project in the path"));
            }
        }

        let view = ArchView {
            id,
            name: self.name,
            project_id: project_id.to_string(),
            kind: self.kind,
            description: self.description,
            components: Vec::new(),
        };
        view.validate()?;
        Ok(view)
    }
}
