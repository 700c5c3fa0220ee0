use crate::models::ServerRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Registry bucket is not configured")]
    MissingBucket,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Object store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Object store returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Concurrent writers kept modifying '{key}'")]
    WriteContention { key: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Key-value view of the registry bucket.
///
/// Keys are server names. Implementations give no atomicity across keys and
/// resolve concurrent writes to the same key as last-write-wins.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ServerRepository: Send + Sync {
    async fn get(&self, name: &str) -> RepositoryResult<Option<ServerRecord>>;
    async fn put(&self, name: &str, record: &ServerRecord) -> RepositoryResult<()>;
    /// Removing a key that does not exist is not an error.
    async fn delete(&self, name: &str) -> RepositoryResult<()>;
    /// `None` when the store holds no mapping at all.
    async fn list(&self) -> RepositoryResult<Option<BTreeMap<String, ServerRecord>>>;
}

pub(crate) fn require_bucket(bucket: &str) -> RepositoryResult<&str> {
    if bucket.trim().is_empty() {
        return Err(RepositoryError::MissingBucket);
    }
    Ok(bucket)
}
