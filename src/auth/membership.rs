use std::sync::Arc;
use thiserror::Error;

use crate::models::{decode_document, Project, Role};
use crate::store::{Collection, DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum MembershipError {
    /// Distinct from "not a member", which resolves to `Role::Anonymous`
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a subject's role inside a project, reading through the store on every call
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn DocumentStore>,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn role_of(&self, project_id: &str, subject: &str) -> Result<Role, MembershipError> {
        let project = self.project(project_id).await?;
        Ok(project.role_of(subject))
    }

    pub async fn project(&self, project_id: &str) -> Result<Project, MembershipError> {
        let doc = self
            .store
            .get(Collection::Projects, project_id)
            .await?
            .ok_or_else(|| MembershipError::ProjectNotFound(project_id.to_string()))?;
        Ok(decode_document::<Project>(doc)?.entity)
    }
}
