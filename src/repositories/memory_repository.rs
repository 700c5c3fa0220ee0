use super::server_repository::{require_bucket, RepositoryResult, ServerRepository};
use crate::models::ServerRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

type Buckets = HashMap<String, BTreeMap<String, ServerRecord>>;

/// Process-local store, used by tests and `STORE_BACKEND=memory`.
///
/// Clones share the same underlying map, so a test can hand one clone to the
/// service and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerRepository {
    bucket: String,
    buckets: Arc<RwLock<Buckets>>,
}

impl InMemoryServerRepository {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            buckets: Arc::default(),
        }
    }

    /// A view of another bucket backed by the same storage.
    pub fn with_bucket(&self, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            buckets: Arc::clone(&self.buckets),
        }
    }

    pub fn len(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        buckets.get(&self.bucket).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ServerRepository for InMemoryServerRepository {
    async fn get(&self, name: &str) -> RepositoryResult<Option<ServerRecord>> {
        let bucket = require_bucket(&self.bucket)?;
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        Ok(buckets.get(bucket).and_then(|b| b.get(name)).cloned())
    }

    async fn put(&self, name: &str, record: &ServerRecord) -> RepositoryResult<()> {
        let bucket = require_bucket(&self.bucket)?;
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> RepositoryResult<()> {
        let bucket = require_bucket(&self.bucket)?;
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = buckets.get_mut(bucket) {
            entries.remove(name);
        }
        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Option<BTreeMap<String, ServerRecord>>> {
        let bucket = require_bucket(&self.bucket)?;
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        Ok(buckets.get(bucket).cloned())
    }
}
