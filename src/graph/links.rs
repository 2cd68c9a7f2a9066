use serde_json::{json, Map};
use uuid::Uuid;

use super::{GraphError, GraphStore};
use crate::models::{decode_document, encode_document, Link, NewLink, ValidationErrors, Versioned};
use crate::store::Collection;

impl GraphStore {
    /// Create a link between two visible components of the project
    pub async fn create_link(&self, project_id: &str, new: NewLink) -> Result<Versioned<Link>, GraphError> {
        let link = new.into_link(Uuid::new_v4().to_string(), project_id)?;

        let mut errors = ValidationErrors::new();
        for (field, component_id) in [("source", &link.source), ("target", &link.target)] {
            match self.load_component(project_id, component_id).await {
                Ok(_) => {}
                Err(GraphError::NotFound { .. }) => {
                    errors.add(field, format!("'{}' is not a component of this project", component_id));
                }
                Err(e) => return Err(e),
            }
        }
        errors.into_result()?;

        let body = encode_document(&link, &Map::new())?;
        let version = self.store.insert(Collection::Links, &link.id, body).await?;
        tracing::info!("Linked '{}' -> '{}' in project '{}'", link.source, link.target, project_id);
        Ok(Versioned { entity: link, version })
    }

    pub async fn get_link(&self, project_id: &str, link_id: &str) -> Result<Versioned<Link>, GraphError> {
        let not_found = || GraphError::not_found(Collection::Links, link_id);
        let doc = self.store.get(Collection::Links, link_id).await?.ok_or_else(not_found)?;
        let loaded = decode_document::<Link>(doc)?;
        if loaded.entity.project_id != project_id {
            return Err(not_found());
        }
        Ok(loaded.into_versioned())
    }

    pub async fn list_links(&self, project_id: &str) -> Result<Vec<Link>, GraphError> {
        let docs = self
            .store
            .find_eq(Collection::Links, "projectID", &json!(project_id))
            .await?;
        docs.into_iter()
            .map(|doc| Ok(decode_document::<Link>(doc)?.entity))
            .collect()
    }
}
