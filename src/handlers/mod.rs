// handlers/mod.rs - project-scoped HTTP handlers
//
// Every handler runs the same explicit pipeline: authenticate (and, for
// project routes, authorize) through the permission gate, decode the body,
// then call into the graph store or project service.

pub mod components;
pub mod links;
pub mod me;
pub mod projects;
pub mod views;

use axum::body::Bytes;
use axum::http::{header::IF_MATCH, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::api::response::parse_etag;
use crate::auth::{CredentialVerifier, MembershipResolver, PermissionGate, SigningKey};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::graph::GraphStore;
use crate::models::{Permission, ValidationErrors};
use crate::services::ProjectService;
use crate::store::DocumentStore;

/// Permissions required by project-scoped routes
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub create_view: Permission,
    pub read: Permission,
    pub write: Permission,
    pub manage_members: Permission,
}

impl AccessPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            create_view: Permission::AnyOf(config.security.view_create_roles.clone()),
            read: Permission::Member,
            write: Permission::Member,
            manage_members: Permission::owner(),
        }
    }
}

/// Shared, immutable handler state
#[derive(Clone)]
pub struct AppState {
    pub gate: PermissionGate,
    pub graph: GraphStore,
    pub projects: ProjectService,
    pub store: Arc<dyn DocumentStore>,
    pub policy: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, key: Arc<SigningKey>, config: &AppConfig) -> Self {
        let verifier = CredentialVerifier::new(key).with_clock_skew(config.security.clock_skew_secs);
        let gate = PermissionGate::new(verifier, MembershipResolver::new(store.clone()));

        Self {
            gate,
            graph: GraphStore::new(store.clone(), config.store.cas_retries),
            projects: ProjectService::new(store.clone(), config.store.cas_retries),
            store,
            policy: Arc::new(AccessPolicy::from_config(config)),
        }
    }
}

/// Decode a JSON request body; any decode failure is a validation failure
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ValidationErrors::single("body", "A JSON request body is required").into());
    }
    serde_json::from_slice(body).map_err(|e| ValidationErrors::from_decode(&e).into())
}

/// Decode a merge-patch document
pub fn parse_patch(body: &Bytes) -> Result<Value, ApiError> {
    parse_body::<Value>(body)
}

/// Version the client expects to overwrite, from `If-Match`
pub fn expected_version(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
    let Some(value) = headers.get(IF_MATCH) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::from(ValidationErrors::single("If-Match", "Header is not valid text")))?;
    if value.trim() == "*" {
        return Ok(None);
    }
    parse_etag(value)
        .map(Some)
        .ok_or_else(|| ValidationErrors::single("If-Match", format!("'{}' is not an entity version", value)).into())
}
