//! Document store abstraction.
//!
//! Entity state lives in an external store reachable by primary-key lookup,
//! equality filters and atomic single-document updates. Every document carries
//! a version counter that is compared-and-swapped on write.

pub mod memory;
pub mod postgres;
pub mod timed;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use timed::TimedStore;

/// Collections known to the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Projects,
    Views,
    Components,
    Links,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
            Collection::Views => "archviews",
            Collection::Components => "archviewcomponents",
            Collection::Links => "links",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store operations, used for logging and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Find,
    Insert,
    Replace,
    Delete,
}

impl StoreOp {
    pub fn is_read(&self) -> bool {
        matches!(self, StoreOp::Get | StoreOp::Find)
    }
}

/// A raw document together with its current version
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub version: u64,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} '{id}' does not exist")]
    Missing { collection: Collection, id: String },

    #[error("{collection} '{id}' already exists")]
    Duplicate { collection: Collection, id: String },

    #[error("{collection} '{id}' version mismatch: expected {expected}, found {actual}")]
    VersionMismatch {
        collection: Collection,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("store {op:?} timed out after {millis}ms")]
    Timeout { op: StoreOp, millis: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("stored document could not be decoded: {0}")]
    Decode(String),

    #[error("injected {op:?} failure on {collection}")]
    Injected { op: StoreOp, collection: Collection },

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the outcome of a failed write is unknown (it may still have been applied)
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Sqlx(_) | StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by primary key
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Equality filter on a top-level field, ordered by id
    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Insert a new document at version 1; fails if the id is taken
    async fn insert(&self, collection: Collection, id: &str, body: Value) -> Result<u64, StoreError>;

    /// Replace a document only if its version still equals `expected_version`.
    /// Returns the new version.
    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> Result<u64, StoreError>;

    /// Returns whether a document was removed
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Open the configured backend and wrap it with the per-call timeout policy
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let inner: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory document store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
            let store = PgStore::connect(url, config.max_connections, config.op_timeout()).await?;
            store.migrate().await?;
            Arc::new(store)
        }
    };

    Ok(Arc::new(TimedStore::new(inner, config.op_timeout(), config.read_retries)))
}
