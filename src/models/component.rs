use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::validation::{require_text, ValidationErrors};
use super::view::{ArchView, ViewKind};
use super::Entity;
use crate::store::Collection;

pub const STATE_KEY: &str = "state";
pub const CREATED_AT_KEY: &str = "createdAt";

/// Two-phase insert state of a component document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    /// Written, but not yet confirmed in its view's component list
    Pending,
    Committed,
    /// Claimed for removal by the sweep; never visible and never committed
    Abandoned,
}

impl ComponentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentState::Pending => "pending",
            ComponentState::Committed => "committed",
            ComponentState::Abandoned => "abandoned",
        }
    }

    /// Read the state from a document's internal keys; documents without one are committed
    pub fn from_internal(internal: &Map<String, Value>) -> Self {
        match internal.get(STATE_KEY).and_then(Value::as_str) {
            Some("pending") => ComponentState::Pending,
            Some("abandoned") => ComponentState::Abandoned,
            _ => ComponentState::Committed,
        }
    }
}

/// Internal keys for a freshly written, not yet committed component
pub fn pending_marker(now: DateTime<Utc>) -> Map<String, Value> {
    let mut internal = Map::new();
    internal.insert(STATE_KEY.into(), Value::String(ComponentState::Pending.as_str().into()));
    internal.insert(CREATED_AT_KEY.into(), Value::String(now.to_rfc3339()));
    internal
}

/// When the component document was first written, if recorded
pub fn created_at(internal: &Map<String, Value>) -> Option<DateTime<Utc>> {
    internal
        .get(CREATED_AT_KEY)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchViewComponent {
    pub id: String,
    pub kind: ViewKind,
    /// Free-text tag used by user-story views
    #[serde(default, rename = "userKind", skip_serializing_if = "Option::is_none")]
    pub user_kind: Option<String>,
    pub description: String,
    #[serde(rename = "viewID")]
    pub view_id: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl Entity for ArchViewComponent {
    const COLLECTION: Collection = Collection::Components;
    const READ_ONLY: &'static [&'static str] = &["id", "projectID", "viewID"];
    const INTERNAL: &'static [&'static str] = &[STATE_KEY, CREATED_AT_KEY];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "id", &self.id, None);
        require_text(&mut errors, "description", &self.description, None);
        require_text(&mut errors, "viewID", &self.view_id, None);
        require_text(&mut errors, "projectID", &self.project_id, None);
        errors.into_result()
    }
}

/// Body of an add-component request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewComponent {
    pub kind: ViewKind,
    #[serde(default, rename = "userKind")]
    pub user_kind: Option<String>,
    pub description: String,
    #[serde(default, rename = "viewID")]
    pub view_id: Option<String>,
    #[serde(default, rename = "projectID")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl NewComponent {
    /// Build the component owned by `view`; echoed scope fields must agree with it
    pub fn into_component(self, id: String, view: &ArchView) -> Result<ArchViewComponent, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.view_id.as_deref().is_some_and(|v| v != view.id) {
            errors.add("viewID", "Does not match the view in the path");
        }
        if self.project_id.as_deref().is_some_and(|p| p != view.project_id) {
            errors.add("projectID", "Does not match the view's project");
        }
        errors.into_result()?;

        let component = ArchViewComponent {
            id,
            kind: self.kind,
            user_kind: self.user_kind,
            description: self.description,
            view_id: view.id.clone(),
            project_id: view.project_id.clone(),
            functions: self.functions,
            variables: self.variables,
            links: self.links,
        };
        component.validate()?;
        Ok(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view() -> ArchView {
        ArchView {
            id: "v1".into(),
            name: "functional".into(),
            project_id: "proj1".into(),
            kind: ViewKind::Functional,
            description: String::new(),
            components: vec![],
        }
    }

    #[test]
    fn description_is_required() {
        let new: NewComponent = serde_json::from_value(json!({"kind": "functional", "description": " "})).unwrap();
        let err = new.into_component("c1".into(), &view()).unwrap_err();
        assert!(err.contains("description"));

        let missing = serde_json::from_value::<NewComponent>(json!({"kind": "functional"}));
        assert!(missing.is_err());
    }

    #[test]
    fn scope_is_taken_from_the_view() {
        let new: NewComponent =
            serde_json::from_value(json!({"kind": "development", "description": "db", "functions": ["open"]}))
                .unwrap();
        let c = new.into_component("c1".into(), &view()).unwrap();
        assert_eq!(c.view_id, "v1");
        assert_eq!(c.project_id, "proj1");
        assert_eq!(c.functions, vec!["open"]);
    }

    #[test]
    fn foreign_view_id_is_rejected() {
        let new: NewComponent =
            serde_json::from_value(json!({"kind": "functional", "description": "x", "viewID": "v2"})).unwrap();
        assert!(new.into_component("c1".into(), &view()).unwrap_err().contains("viewID"));
    }

    #[test]
    fn state_defaults_to_committed() {
        assert_eq!(ComponentState::from_internal(&Map::new()), ComponentState::Committed);
        let marker = pending_marker(Utc::now());
        assert_eq!(ComponentState::from_internal(&marker), ComponentState::Pending);
        assert!(created_at(&marker).is_some());

        let mut claimed = marker;
        claimed.insert(STATE_KEY.into(), json!("abandoned"));
        assert_eq!(ComponentState::from_internal(&claimed), ComponentState::Abandoned);
    }
}
