pub mod component;
pub mod link;
pub mod project;
pub mod user;
pub mod validation;
pub mod view;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::{Collection, StoreError, StoredDocument};

pub use component::{ArchViewComponent, ComponentState, NewComponent};
pub use link::{Link, NewLink};
pub use project::{Member, NewMember, NewProject, Permission, Project, Role, ANONYMOUS_ROLE, OWNER_ROLE};
pub use user::{User, UserProfile};
pub use validation::ValidationErrors;
pub use view::{ArchView, NewView, ViewKind};

/// A persisted entity with its public JSON representation.
///
/// `INTERNAL` keys are stored alongside the entity but are never part of its
/// public representation; `READ_ONLY` keys may not change under a patch.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    const READ_ONLY: &'static [&'static str];
    const INTERNAL: &'static [&'static str] = &[];

    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// An entity together with the store version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<E> {
    pub entity: E,
    pub version: u64,
}

/// An entity decoded from a stored document, plus its internal bookkeeping keys
#[derive(Debug, Clone)]
pub struct Loaded<E> {
    pub entity: E,
    pub version: u64,
    pub internal: Map<String, Value>,
}

impl<E> Loaded<E> {
    pub fn internal_str(&self, key: &str) -> Option<&str> {
        self.internal.get(key).and_then(Value::as_str)
    }

    pub fn into_versioned(self) -> Versioned<E> {
        Versioned {
            entity: self.entity,
            version: self.version,
        }
    }
}

/// Split a stored document into the entity and its internal keys
pub fn decode_document<E: Entity>(doc: StoredDocument) -> Result<Loaded<E>, StoreError> {
    let Value::Object(mut body) = doc.body else {
        return Err(StoreError::Decode(format!("{} '{}' is not an object", E::COLLECTION, doc.id)));
    };

    let mut internal = Map::new();
    for key in E::INTERNAL {
        if let Some(value) = body.remove(*key) {
            internal.insert((*key).to_string(), value);
        }
    }

    let entity = serde_json::from_value(Value::Object(body))
        .map_err(|e| StoreError::Decode(format!("{} '{}': {}", E::COLLECTION, doc.id, e)))?;

    Ok(Loaded {
        entity,
        version: doc.version,
        internal,
    })
}

/// Serialize an entity and attach its internal keys
pub fn encode_document<E: Entity>(entity: &E, internal: &Map<String, Value>) -> Result<Value, StoreError> {
    let mut body = match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(StoreError::Decode(format!("{} did not serialize to an object", E::COLLECTION))),
        Err(e) => return Err(StoreError::Decode(e.to_string())),
    };
    for (key, value) in internal {
        body.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(body))
}
