use futures::future::try_join_all;
use serde_json::Map;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{MembershipError, MembershipResolver};
use crate::models::{
    decode_document, encode_document, Entity, NewMember, NewProject, Project, User, UserProfile, ValidationErrors,
    Versioned,
};
use crate::store::{Collection, DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{collection} '{id}' is being modified concurrently, retries exhausted")]
    Contended { collection: Collection, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MembershipError> for ProjectError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::ProjectNotFound(id) => ProjectError::NotFound(id),
            MembershipError::Store(e) => ProjectError::Store(e),
        }
    }
}

/// Projects, their member lists, and the per-user project index.
///
/// The project document is authoritative for membership. The `projectIDs`
/// index on the user document is written first and may run ahead of it;
/// readers re-check every indexed project through the membership resolver.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn DocumentStore>,
    resolver: MembershipResolver,
    cas_retries: u32,
}

impl ProjectService {
    pub fn new(store: Arc<dyn DocumentStore>, cas_retries: u32) -> Self {
        Self {
            resolver: MembershipResolver::new(store.clone()),
            store,
            cas_retries: cas_retries.max(1),
        }
    }

    /// Create a project owned by `owner`
    pub async fn create_project(&self, owner: &str, new: NewProject) -> Result<Versioned<Project>, ProjectError> {
        let project = Project::new(Uuid::new_v4().to_string(), new.name, owner);
        project.validate()?;

        self.record_membership(owner, &project.id).await?;
        let body = encode_document(&project, &Map::new())?;
        let version = self.store.insert(Collection::Projects, &project.id, body).await?;

        tracing::info!("Created project '{}' owned by '{}'", project.id, owner);
        Ok(Versioned {
            entity: project,
            version,
        })
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Versioned<Project>, ProjectError> {
        let doc = self
            .store
            .get(Collection::Projects, project_id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(project_id.to_string()))?;
        Ok(decode_document::<Project>(doc)?.into_versioned())
    }

    /// Add a member with a project-defined role.
    ///
    /// Re-adding a member with the role they already hold is a no-op; any
    /// other existing membership is rejected.
    pub async fn add_member(&self, project_id: &str, new: NewMember) -> Result<Versioned<Project>, ProjectError> {
        let member = new.into_member()?;

        let current = self.get_project(project_id).await?;
        check_addable(&current.entity, &member.id, &member.role)?;
        self.record_membership(&member.id, project_id).await?;

        for _ in 0..self.cas_retries {
            let loaded = self.get_project(project_id).await?;
            let mut project = loaded.entity;
            if check_addable(&project, &member.id, &member.role)? {
                return Ok(Versioned {
                    entity: project,
                    version: loaded.version,
                });
            }

            project.members.push(member.clone());
            project.validate()?;
            let body = encode_document(&project, &Map::new())?;
            match self.store.replace(Collection::Projects, project_id, loaded.version, body).await {
                Ok(version) => {
                    tracing::info!("Added '{}' to project '{}' as '{}'", member.id, project_id, member.role);
                    return Ok(Versioned {
                        entity: project,
                        version,
                    });
                }
                Err(StoreError::VersionMismatch { .. }) => {
                    tracing::debug!("Project '{}' changed during member add, retrying", project_id);
                }
                Err(StoreError::Missing { .. }) => return Err(ProjectError::NotFound(project_id.to_string())),
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProjectError::Contended {
            collection: Collection::Projects,
            id: project_id.to_string(),
        })
    }

    /// Projects `subject` currently belongs to
    pub async fn list_for_subject(&self, subject: &str) -> Result<Vec<Project>, ProjectError> {
        let Some(user) = self.load_user(subject).await? else {
            return Ok(Vec::new());
        };

        let lookups = user.project_ids.iter().map(|id| async move {
            match self.resolver.project(id).await {
                Ok(project) => Ok(Some(project)),
                Err(MembershipError::ProjectNotFound(_)) => Ok(None),
                Err(MembershipError::Store(e)) => Err(e),
            }
        });

        let projects = try_join_all(lookups).await?;
        Ok(projects
            .into_iter()
            .flatten()
            .filter(|project| project.role_of(subject).is_member())
            .collect())
    }

    /// Profile of `subject`; subjects with no memberships yet get a default one
    pub async fn profile(&self, subject: &str) -> Result<UserProfile, ProjectError> {
        let user = self.load_user(subject).await?.unwrap_or_else(|| User::new(subject));
        Ok(user.into())
    }

    async fn load_user(&self, subject: &str) -> Result<Option<User>, ProjectError> {
        match self.store.get(Collection::Users, subject).await? {
            Some(doc) => Ok(Some(decode_document::<User>(doc)?.entity)),
            None => Ok(None),
        }
    }

    /// Index `project_id` on the user document, creating it on first membership
    async fn record_membership(&self, subject: &str, project_id: &str) -> Result<(), ProjectError> {
        for _ in 0..self.cas_retries {
            let Some(doc) = self.store.get(Collection::Users, subject).await? else {
                let mut user = User::new(subject);
                user.project_ids.push(project_id.to_string());
                let body = encode_document(&user, &Map::new())?;
                match self.store.insert(Collection::Users, subject, body).await {
                    Ok(_) => {
                        tracing::info!("Created user '{}'", subject);
                        return Ok(());
                    }
                    Err(StoreError::Duplicate { .. }) => continue,
                    Err(e) => return Err(e.into()),
                }
            };

            let loaded = decode_document::<User>(doc)?;
            let mut user = loaded.entity;
            if user.project_ids.iter().any(|id| id == project_id) {
                return Ok(());
            }
            user.project_ids.push(project_id.to_string());

            let body = encode_document(&user, &loaded.internal)?;
            match self.store.replace(Collection::Users, subject, loaded.version, body).await {
                Ok(_) => return Ok(()),
                Err(StoreError::VersionMismatch { .. }) | Err(StoreError::Missing { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProjectError::Contended {
            collection: Collection::Users,
            id: subject.to_string(),
        })
    }
}

/// Ok(true) when `subject` already holds `role`, Ok(false) when it may be added
fn check_addable(project: &Project, subject: &str, role: &str) -> Result<bool, ValidationErrors> {
    match project.member(subject) {
        None => Ok(false),
        Some(existing) if existing.role == role => Ok(true),
        Some(existing) => Err(ValidationErrors::single(
            "id",
            format!("'{}' is already a member with role '{}'", subject, existing.role),
        )),
    }
}
