use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::{Collection, DocumentStore, StoreError, StoreOp, StoredDocument};

/// Bounds every store call with a timeout.
///
/// Reads that time out are retried up to `read_retries` times. Writes are
/// attempted once and a timeout is surfaced to the caller.
pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    op_timeout: Duration,
    read_retries: u32,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, op_timeout: Duration, read_retries: u32) -> Self {
        Self {
            inner,
            op_timeout,
            read_retries,
        }
    }

    async fn bounded<T, F, Fut>(&self, op: StoreOp, call: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let attempts = if op.is_read() { self.read_retries + 1 } else { 1 };
        let millis = self.op_timeout.as_millis() as u64;

        for attempt in 1..=attempts {
            match timeout(self.op_timeout, call()).await {
                Ok(result) => return result,
                Err(_) if attempt < attempts => {
                    tracing::warn!("Store {:?} timed out after {}ms, retrying ({}/{})", op, millis, attempt, attempts);
                }
                Err(_) => {
                    tracing::error!("Store {:?} timed out after {}ms", op, millis);
                }
            }
        }

        Err(StoreError::Timeout { op, millis })
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Get, || inner.get(collection, id)).await
    }

    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Find, || inner.find_eq(collection, field, value)).await
    }

    async fn insert(&self, collection: Collection, id: &str, body: Value) -> Result<u64, StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Insert, || inner.insert(collection, id, body.clone())).await
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> Result<u64, StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Replace, || inner.replace(collection, id, expected_version, body.clone()))
            .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Delete, || inner.delete(collection, id)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        self.bounded(StoreOp::Get, || inner.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Hangs on the first `stall_reads` reads, then delegates
    struct StallingStore {
        inner: MemoryStore,
        stall_reads: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for StallingStore {
        async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>, StoreError> {
            if self.stall_reads.load(Ordering::SeqCst) > 0 {
                self.stall_reads.fetch_sub(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.get(collection, id).await
        }

        async fn find_eq(&self, c: Collection, f: &str, v: &Value) -> Result<Vec<StoredDocument>, StoreError> {
            self.inner.find_eq(c, f, v).await
        }

        async fn insert(&self, collection: Collection, id: &str, body: Value) -> Result<u64, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.inner.insert(collection, id, body).await
        }

        async fn replace(&self, c: Collection, id: &str, v: u64, body: Value) -> Result<u64, StoreError> {
            self.inner.replace(c, id, v, body).await
        }

        async fn delete(&self, c: Collection, id: &str) -> Result<bool, StoreError> {
            self.inner.delete(c, id).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn read_timeout_is_retried() {
        let inner = MemoryStore::new();
        inner.insert(Collection::Views, "v", json!({"n": 1})).await.unwrap();
        let stalling = StallingStore {
            inner,
            stall_reads: AtomicU32::new(1),
        };
        let store = TimedStore::new(Arc::new(stalling), Duration::from_millis(20), 1);

        let doc = store.get(Collection::Views, "v").await.unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn write_timeout_is_surfaced() {
        let stalling = StallingStore {
            inner: MemoryStore::new(),
            stall_reads: AtomicU32::new(0),
        };
        let store = TimedStore::new(Arc::new(stalling), Duration::from_millis(20), 3);

        let result = store.insert(Collection::Views, "v", json!({})).await;
        assert!(matches!(result, Err(StoreError::Timeout { op: StoreOp::Insert, .. })));
    }
}
