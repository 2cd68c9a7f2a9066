use serde::{Deserialize, Serialize};

use super::validation::{require_text, ValidationErrors};
use super::Entity;
use crate::store::Collection;

/// Directed reference between two components of the same project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    pub id: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub description: String,
}

impl Entity for Link {
    const COLLECTION: Collection = Collection::Links;
    const READ_ONLY: &'static [&'static str] = &["id", "projectID", "source", "target"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "projectID", &self.project_id, None);
        require_text(&mut errors, "source", &self.source, None);
        require_text(&mut errors, "target", &self.target, None);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub description: String,
}

impl NewLink {
    pub fn into_link(self, id: String, project_id: &str) -> Result<Link, ValidationErrors> {
        let link = Link {
            id,
            project_id: project_id.to_string(),
            source: self.source,
            target: self.target,
            description: self.description,
        };
        link.validate()?;
        Ok(link)
    }
}
