//! Merge-patch engine.
//!
//! Fetches an entity, merges a JSON merge-patch document into its canonical
//! representation, re-validates it and writes it back with a compare-and-swap
//! on the version that was read.

pub mod merge;

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{decode_document, encode_document, Entity, ValidationErrors, Versioned};
use crate::store::{Collection, DocumentStore, StoreError};

pub use merge::merge_patch;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{collection} '{id}' not found")]
    NotFound { collection: Collection, id: String },

    #[error("{collection} '{id}' was modified concurrently (read version {expected}, current version {actual})")]
    Conflict {
        collection: Collection,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct PatchEngine {
    store: Arc<dyn DocumentStore>,
}

impl PatchEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Apply `patch` to the entity `id`.
    ///
    /// `in_scope` rejects entities outside the caller's scope as not found.
    /// When `expected_version` is given it must equal the stored version.
    /// Nothing is written unless the merged entity validates and differs from
    /// the stored one.
    pub async fn apply<E, F>(
        &self,
        id: &str,
        patch: &Value,
        expected_version: Option<u64>,
        in_scope: F,
    ) -> Result<Versioned<E>, PatchError>
    where
        E: Entity,
        F: FnOnce(&E) -> bool + Send,
    {
        let not_found = || PatchError::NotFound {
            collection: E::COLLECTION,
            id: id.to_string(),
        };

        if !patch.is_object() {
            return Err(ValidationErrors::single("body", "Patch document must be a JSON object").into());
        }

        let doc = self.store.get(E::COLLECTION, id).await?.ok_or_else(not_found)?;
        let loaded = decode_document::<E>(doc)?;
        if !in_scope(&loaded.entity) {
            return Err(not_found());
        }

        if let Some(expected) = expected_version {
            if expected != loaded.version {
                return Err(PatchError::Conflict {
                    collection: E::COLLECTION,
                    id: id.to_string(),
                    expected,
                    actual: loaded.version,
                });
            }
        }

        let canonical = serde_json::to_value(&loaded.entity).map_err(|e| StoreError::Decode(e.to_string()))?;
        let mut merged = canonical.clone();
        merge_patch(&mut merged, patch);

        let mut errors = ValidationErrors::new();
        for field in E::READ_ONLY {
            if canonical.get(*field) != merged.get(*field) {
                errors.add(*field, "This field is read-only");
            }
        }
        errors.into_result()?;

        let entity: E = serde_json::from_value(merged).map_err(|e| ValidationErrors::from_decode(&e))?;
        entity.validate()?;

        let next = serde_json::to_value(&entity).map_err(|e| StoreError::Decode(e.to_string()))?;
        if next == canonical {
            tracing::debug!("Patch on {} '{}' changes nothing; skipping write", E::COLLECTION, id);
            return Ok(Versioned {
                entity,
                version: loaded.version,
            });
        }

        let body = encode_document(&entity, &loaded.internal)?;
        match self.store.replace(E::COLLECTION, id, loaded.version, body).await {
            Ok(version) => {
                tracing::info!("Patched {} '{}' to version {}", E::COLLECTION, id, version);
                Ok(Versioned { entity, version })
            }
            Err(StoreError::VersionMismatch { expected, actual, .. }) => {
                tracing::warn!(
                    "Concurrent write on {} '{}': read version {}, now {}",
                    E::COLLECTION,
                    id,
                    expected,
                    actual
                );
                Err(PatchError::Conflict {
                    collection: E::COLLECTION,
                    id: id.to_string(),
                    expected,
                    actual,
                })
            }
            Err(StoreError::Missing { .. }) => Err(not_found()),
            Err(other) => Err(other.into()),
        }
    }
}
