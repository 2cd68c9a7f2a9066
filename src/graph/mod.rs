//! View and component graph.
//!
//! A view's `components` list is the authoritative index of its components.
//! Adding a component touches two documents, so it runs as a two-phase
//! sequence: the component is written `pending`, its id is appended to the
//! view with a compare-and-swap, and only then is it marked `committed`.
//! Anything left pending by an interrupted sequence is settled by
//! [`GraphStore::sweep_pending`]. The commit is a compare-and-swap on the
//! component too, so a component the sweep has claimed can never end up
//! committed; the add backs its id out of the view and fails instead.

pub mod links;
pub mod sweep;

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::component::{pending_marker, STATE_KEY};
use crate::models::{
    decode_document, encode_document, ArchView, ArchViewComponent, ComponentState, Entity, Loaded, NewComponent,
    NewView, ValidationErrors, Versioned,
};
use crate::patch::{PatchEngine, PatchError};
use crate::store::{Collection, DocumentStore, StoreError};

pub use sweep::SweepReport;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{collection} '{id}' not found")]
    NotFound { collection: Collection, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The view kept changing underneath every append attempt
    #[error("view '{view_id}' is being modified concurrently, retries exhausted")]
    Contended { view_id: String },

    /// The sweep removed the pending component before it could be committed
    #[error("component '{component_id}' was rolled back before it could be committed")]
    RolledBack { component_id: String },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GraphError {
    fn not_found(collection: Collection, id: &str) -> Self {
        GraphError::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    /// Whether a failed write may nonetheless have been applied
    pub fn is_ambiguous(&self) -> bool {
        match self {
            GraphError::Store(e) => e.is_ambiguous(),
            GraphError::Patch(PatchError::Store(e)) => e.is_ambiguous(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListEdit {
    Append,
    Remove,
}

#[derive(Clone)]
pub struct GraphStore {
    store: Arc<dyn DocumentStore>,
    patches: PatchEngine,
    cas_retries: u32,
}

impl GraphStore {
    pub fn new(store: Arc<dyn DocumentStore>, cas_retries: u32) -> Self {
        Self {
            patches: PatchEngine::new(store.clone()),
            store,
            cas_retries: cas_retries.max(1),
        }
    }

    pub async fn create_view(&self, project_id: &str, new: NewView) -> Result<Versioned<ArchView>, GraphError> {
        let view = new.into_view(Uuid::new_v4().to_string(), project_id)?;
        let body = encode_document(&view, &Map::new())?;
        let version = self.store.insert(Collection::Views, &view.id, body).await?;

        tracing::info!("Created view '{}' ({}) in project '{}'", view.id, view.kind, project_id);
        Ok(Versioned { entity: view, version })
    }

    /// Point lookup; a view of another project is not found
    pub async fn get_view(&self, project_id: &str, view_id: &str) -> Result<Versioned<ArchView>, GraphError> {
        Ok(self.load_view(project_id, view_id).await?.into_versioned())
    }

    pub async fn list_views(&self, project_id: &str) -> Result<Vec<ArchView>, GraphError> {
        let docs = self
            .store
            .find_eq(Collection::Views, "projectID", &json!(project_id))
            .await?;
        docs.into_iter()
            .map(|doc| Ok(decode_document::<ArchView>(doc)?.entity))
            .collect()
    }

    pub async fn patch_view(
        &self,
        project_id: &str,
        view_id: &str,
        patch: &Value,
        expected_version: Option<u64>,
    ) -> Result<Versioned<ArchView>, GraphError> {
        let patched = self
            .patches
            .apply::<ArchView, _>(view_id, patch, expected_version, |view| view.project_id == project_id)
            .await?;
        Ok(patched)
    }

    /// Add a component to a view.
    ///
    /// On return the view lists the component. If the append fails the
    /// pending component is removed again, unless the failure leaves it
    /// unknown whether the append landed; those are left to the sweep.
    pub async fn add_component(
        &self,
        project_id: &str,
        view_id: &str,
        new: NewComponent,
    ) -> Result<Versioned<ArchViewComponent>, GraphError> {
        let view = self.load_view(project_id, view_id).await?;
        let component = new.into_component(Uuid::new_v4().to_string(), &view.entity)?;

        // Phase 1: pending component
        let mut internal = pending_marker(Utc::now());
        let body = encode_document(&component, &internal)?;
        let version = self.store.insert(Collection::Components, &component.id, body).await?;
        tracing::debug!("Wrote pending component '{}' for view '{}'", component.id, view_id);

        // Phase 2: index it on the view
        if let Err(e) = self.edit_view_list(view_id, &component.id, ListEdit::Append).await {
            self.compensate(&component.id, &e).await;
            return Err(e);
        }

        // Phase 3: commit
        internal.insert(STATE_KEY.into(), Value::String(ComponentState::Committed.as_str().into()));
        let version = self.commit(&component, &internal, version).await?;

        tracing::info!("Added component '{}' to view '{}'", component.id, view_id);
        Ok(Versioned {
            entity: component,
            version,
        })
    }

    /// Point lookup scoped to a view. Pending components are visible only once
    /// their view lists them.
    pub async fn get_component(
        &self,
        project_id: &str,
        view_id: &str,
        component_id: &str,
    ) -> Result<Versioned<ArchViewComponent>, GraphError> {
        let loaded = self.load_component(project_id, component_id).await?;
        if loaded.entity.view_id != view_id {
            return Err(GraphError::not_found(Collection::Components, component_id));
        }
        Ok(loaded.into_versioned())
    }

    pub async fn patch_component(
        &self,
        project_id: &str,
        view_id: &str,
        component_id: &str,
        patch: &Value,
        expected_version: Option<u64>,
    ) -> Result<Versioned<ArchViewComponent>, GraphError> {
        // Visibility first, so an unlisted pending component cannot be patched
        self.get_component(project_id, view_id, component_id).await?;

        let patched = self
            .patches
            .apply::<ArchViewComponent, _>(component_id, patch, expected_version, |c| {
                c.project_id == project_id && c.view_id == view_id
            })
            .await?;
        Ok(patched)
    }

    async fn load_view(&self, project_id: &str, view_id: &str) -> Result<Loaded<ArchView>, GraphError> {
        let doc = self
            .store
            .get(Collection::Views, view_id)
            .await?
            .ok_or_else(|| GraphError::not_found(Collection::Views, view_id))?;
        let loaded = decode_document::<ArchView>(doc)?;
        if loaded.entity.project_id != project_id {
            return Err(GraphError::not_found(Collection::Views, view_id));
        }
        Ok(loaded)
    }

    /// Load a component of `project_id` that is visible to readers
    pub(crate) async fn load_component(
        &self,
        project_id: &str,
        component_id: &str,
    ) -> Result<Loaded<ArchViewComponent>, GraphError> {
        let doc = self
            .store
            .get(Collection::Components, component_id)
            .await?
            .ok_or_else(|| GraphError::not_found(Collection::Components, component_id))?;
        let loaded = decode_document::<ArchViewComponent>(doc)?;
        if loaded.entity.project_id != project_id {
            return Err(GraphError::not_found(Collection::Components, component_id));
        }

        let visible = match ComponentState::from_internal(&loaded.internal) {
            ComponentState::Committed => true,
            ComponentState::Pending => self.view_lists(&loaded.entity.view_id, component_id).await?,
            ComponentState::Abandoned => false,
        };
        if !visible {
            tracing::debug!("Component '{}' is not committed and not listed", component_id);
            return Err(GraphError::not_found(Collection::Components, component_id));
        }
        Ok(loaded)
    }

    async fn view_lists(&self, view_id: &str, component_id: &str) -> Result<bool, GraphError> {
        match self.store.get(Collection::Views, view_id).await? {
            Some(doc) => {
                let view = decode_document::<ArchView>(doc)?.entity;
                Ok(view.components.iter().any(|id| id == component_id))
            }
            None => Ok(false),
        }
    }

    /// Mark a listed component committed.
    ///
    /// Fails only when the sweep claimed or removed the component in the
    /// meantime; its id is taken off the view before returning. Any other
    /// commit failure leaves it listed and pending for the sweep to roll forward.
    async fn commit(
        &self,
        component: &ArchViewComponent,
        internal: &Map<String, Value>,
        version: u64,
    ) -> Result<u64, GraphError> {
        let body = match encode_document(component, internal) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Component '{}' could not be re-encoded for commit: {}", component.id, e);
                return Ok(version);
            }
        };

        match self.store.replace(Collection::Components, &component.id, version, body).await {
            Ok(committed) => return Ok(committed),
            Err(StoreError::Missing { .. }) => {}
            Err(StoreError::VersionMismatch { .. }) => {
                // Committed by the sweep, or claimed by it for removal
                if let Some(doc) = self.store.get(Collection::Components, &component.id).await? {
                    let current = decode_document::<ArchViewComponent>(doc)?;
                    if ComponentState::from_internal(&current.internal) != ComponentState::Abandoned {
                        return Ok(current.version);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Component '{}' is listed but could not be marked committed: {}", component.id, e);
                return Ok(version);
            }
        }

        tracing::warn!(
            "Component '{}' was rolled back while being added to view '{}'",
            component.id,
            component.view_id
        );
        self.edit_view_list(&component.view_id, &component.id, ListEdit::Remove)
            .await?;
        Err(GraphError::RolledBack {
            component_id: component.id.clone(),
        })
    }

    /// Add or remove one id in a view's component list under compare-and-swap.
    /// Returns whether the list changed.
    async fn edit_view_list(&self, view_id: &str, component_id: &str, edit: ListEdit) -> Result<bool, GraphError> {
        for attempt in 1..=self.cas_retries {
            let doc = match self.store.get(Collection::Views, view_id).await? {
                Some(doc) => doc,
                None if edit == ListEdit::Remove => return Ok(false),
                None => return Err(GraphError::not_found(Collection::Views, view_id)),
            };
            let loaded = decode_document::<ArchView>(doc)?;
            let mut view = loaded.entity;

            let listed = view.components.iter().any(|id| id == component_id);
            match edit {
                ListEdit::Append if listed => return Ok(false),
                ListEdit::Append => view.components.push(component_id.to_string()),
                ListEdit::Remove if !listed => return Ok(false),
                ListEdit::Remove => view.components.retain(|id| id != component_id),
            }
            view.validate()?;

            let body = encode_document(&view, &loaded.internal)?;
            match self.store.replace(Collection::Views, view_id, loaded.version, body).await {
                Ok(_) => return Ok(true),
                Err(StoreError::VersionMismatch { actual, .. }) => {
                    tracing::debug!(
                        "View '{}' moved to version {} during {:?} of '{}' (attempt {}/{})",
                        view_id,
                        actual,
                        edit,
                        component_id,
                        attempt,
                        self.cas_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!("Giving up on {:?} of component '{}' in view '{}'", edit, component_id, view_id);
        Err(GraphError::Contended {
            view_id: view_id.to_string(),
        })
    }

    async fn compensate(&self, component_id: &str, cause: &GraphError) {
        if cause.is_ambiguous() {
            tracing::warn!(
                "Append of component '{}' failed ambiguously ({}); leaving it pending for the sweep",
                component_id,
                cause
            );
            return;
        }

        match self.store.delete(Collection::Components, component_id).await {
            Ok(_) => tracing::info!("Rolled back pending component '{}' after: {}", component_id, cause),
            Err(e) => tracing::error!(
                "Could not roll back pending component '{}' ({}); the sweep will remove it",
                component_id,
                e
            ),
        }
    }
}
