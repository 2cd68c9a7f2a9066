use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::{oneshot, RwLock};

use super::{Collection, DocumentStore, StoreError, StoreOp, StoredDocument};

/// In-process document store for local development and tests.
///
/// Each operation takes the lock once, so single-document updates are atomic
/// and versions are compared-and-swapped exactly as an external store would.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, StoredDocument>>>,
    faults: Mutex<Vec<(StoreOp, Collection)>>,
    holds: Mutex<Vec<Hold>>,
}

struct Hold {
    op: StoreOp,
    collection: Collection,
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// An operation parked by [`MemoryStore::hold_next`]
pub struct HeldOp {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl HeldOp {
    /// Wait until the held operation has been called
    pub async fn reached(&mut self) {
        let _ = (&mut self.reached).await;
    }

    /// Let the held operation run
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` against `collection` fail with `StoreError::Injected`
    pub fn fail_next(&self, op: StoreOp, collection: Collection) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push((op, collection));
        }
    }

    /// Park the next `op` against `collection` before it touches any data,
    /// until the returned handle is released. Used to interleave callers.
    pub fn hold_next(&self, op: StoreOp, collection: Collection) -> HeldOp {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        if let Ok(mut holds) = self.holds.lock() {
            holds.push(Hold {
                op,
                collection,
                reached: reached_tx,
                release: release_rx,
            });
        }
        HeldOp {
            reached: reached_rx,
            release: release_tx,
        }
    }

    async fn wait_if_held(&self, op: StoreOp, collection: Collection) {
        let hold = {
            let Ok(mut holds) = self.holds.lock() else {
                return;
            };
            match holds.iter().position(|h| h.op == op && h.collection == collection) {
                Some(pos) => holds.remove(pos),
                None => return,
            }
        };
        tracing::debug!("Holding {:?} on {}", op, collection);
        let _ = hold.reached.send(());
        let _ = hold.release.await;
    }

    fn take_fault(&self, op: StoreOp, collection: Collection) -> Result<(), StoreError> {
        let Ok(mut faults) = self.faults.lock() else {
            return Ok(());
        };
        if let Some(pos) = faults.iter().position(|f| *f == (op, collection)) {
            faults.remove(pos);
            tracing::debug!("Injecting {:?} failure on {}", op, collection);
            return Err(StoreError::Injected { op, collection });
        }
        Ok(())
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.wait_if_held(StoreOp::Get, collection).await;
        self.take_fault(StoreOp::Get, collection)?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.wait_if_held(StoreOp::Find, collection).await;
        self.take_fault(StoreOp::Find, collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| doc.body.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, id: &str, body: Value) -> Result<u64, StoreError> {
        self.wait_if_held(StoreOp::Insert, collection).await;
        self.take_fault(StoreOp::Insert, collection)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::Duplicate {
                collection,
                id: id.to_string(),
            });
        }
        docs.insert(
            id.to_string(),
            StoredDocument {
                id: id.to_string(),
                version: 1,
                body,
            },
        );
        Ok(1)
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> Result<u64, StoreError> {
        self.wait_if_held(StoreOp::Replace, collection).await;
        self.take_fault(StoreOp::Replace, collection)?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::Missing {
                collection,
                id: id.to_string(),
            })?;

        if doc.version != expected_version {
            return Err(StoreError::VersionMismatch {
                collection,
                id: id.to_string(),
                expected: expected_version,
                actual: doc.version,
            });
        }

        doc.version += 1;
        doc.body = body;
        Ok(doc.version)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.wait_if_held(StoreOp::Delete, collection).await;
        self.take_fault(StoreOp::Delete, collection)?;
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(&collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replace_compares_versions() {
        let store = MemoryStore::new();
        store.insert(Collection::Views, "v1", json!({"name": "a"})).await.unwrap();

        let v2 = store.replace(Collection::Views, "v1", 1, json!({"name": "b"})).await.unwrap();
        assert_eq!(v2, 2);

        let stale = store.replace(Collection::Views, "v1", 1, json!({"name": "c"})).await;
        assert!(matches!(stale, Err(StoreError::VersionMismatch { expected: 1, actual: 2, .. })));

        let doc = store.get(Collection::Views, "v1").await.unwrap().unwrap();
        assert_eq!(doc.body, json!({"name": "b"}));
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = MemoryStore::new();
        store.insert(Collection::Links, "l1", json!({})).await.unwrap();
        let dup = store.insert(Collection::Links, "l1", json!({})).await;
        assert!(matches!(dup, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn find_eq_matches_top_level_field() {
        let store = MemoryStore::new();
        store.insert(Collection::Views, "a", json!({"projectID": "p1"})).await.unwrap();
        store.insert(Collection::Views, "b", json!({"projectID": "p2"})).await.unwrap();
        store.insert(Collection::Views, "c", json!({"projectID": "p1"})).await.unwrap();

        let found = store.find_eq(Collection::Views, "projectID", &json!("p1")).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Insert, Collection::Users);

        assert!(store.insert(Collection::Users, "u", json!({})).await.is_err());
        assert!(store.insert(Collection::Users, "u", json!({})).await.is_ok());
        assert_eq!(store.count(Collection::Users).await, 1);
    }

    #[tokio::test]
    async fn held_operation_waits_for_release() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.insert(Collection::Views, "v1", json!({"n": 1})).await.unwrap();
        let mut held = store.hold_next(StoreOp::Replace, Collection::Views);

        let writer = store.clone();
        let task = tokio::spawn(async move { writer.replace(Collection::Views, "v1", 1, json!({"n": 2})).await });
        held.reached().await;

        // Parked before the write, so other callers still see the old body
        let doc = store.get(Collection::Views, "v1").await.unwrap().unwrap();
        assert_eq!(doc.body, json!({"n": 1}));

        held.release();
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }
}
