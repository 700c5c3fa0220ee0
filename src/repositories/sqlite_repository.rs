use super::server_repository::{require_bucket, RepositoryResult, ServerRepository};
use crate::models::ServerRecord;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

pub struct SqliteServerRepository {
    pool: SqlitePool,
    bucket: String,
}

impl SqliteServerRepository {
    pub fn new(pool: SqlitePool, bucket: impl Into<String>) -> Self {
        Self {
            pool,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ServerRepository for SqliteServerRepository {
    async fn get(&self, name: &str) -> RepositoryResult<Option<ServerRecord>> {
        let bucket = require_bucket(&self.bucket)?;

        let row = sqlx::query("SELECT record FROM registry_entries WHERE bucket = ? AND name = ?")
            .bind(bucket)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("record")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, name: &str, record: &ServerRecord) -> RepositoryResult<()> {
        let bucket = require_bucket(&self.bucket)?;
        let raw = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO registry_entries (bucket, name, record, updated_at)
            VALUES (?, ?, ?, unixepoch())
            ON CONFLICT (bucket, name)
            DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
            "#,
        )
        .bind(bucket)
        .bind(name)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> RepositoryResult<()> {
        let bucket = require_bucket(&self.bucket)?;

        sqlx::query("DELETE FROM registry_entries WHERE bucket = ? AND name = ?")
            .bind(bucket)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Option<BTreeMap<String, ServerRecord>>> {
        let bucket = require_bucket(&self.bucket)?;

        let rows = sqlx::query("SELECT name, record FROM registry_entries WHERE bucket = ?")
            .bind(bucket)
            .fetch_all(&self.pool)
            .await?;

        let mut servers = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let raw: String = row.try_get("record")?;
            match serde_json::from_str::<ServerRecord>(&raw) {
                Ok(record) => {
                    servers.insert(name, record);
                }
                Err(e) => tracing::warn!("Skipping malformed registry entry '{}': {}", name, e),
            }
        }

        Ok(Some(servers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_pool, test_helpers::sample_record};

    #[tokio::test]
    async fn test_server_record_lifecycle() {
        let pool = create_test_pool().await;
        let repo = SqliteServerRepository::new(pool, "registry");

        let mut record = sample_record("weather");
        repo.put("weather", &record).await.unwrap();

        let stored = repo.get("weather").await.unwrap().unwrap();
        assert_eq!(stored, record);

        // Upsert replaces the record
        record.version = "2.0.0".to_string();
        repo.put("weather", &record).await.unwrap();
        let stored = repo.get("weather").await.unwrap().unwrap();
        assert_eq!(stored.version, "2.0.0");

        let all = repo.list().await.unwrap().unwrap();
        assert_eq!(all.len(), 1);

        repo.delete("weather").await.unwrap();
        assert!(repo.get("weather").await.unwrap().is_none());
        assert!(repo.list().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_malformed_rows() {
        let pool = create_test_pool().await;
        let repo = SqliteServerRepository::new(pool.clone(), "registry");

        repo.put("good", &sample_record("good")).await.unwrap();
        sqlx::query("INSERT INTO registry_entries (bucket, name, record) VALUES (?, ?, ?)")
            .bind("registry")
            .bind("broken")
            .bind("{not json")
            .execute(&pool)
            .await
            .unwrap();

        let all = repo.list().await.unwrap().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("good"));
    }

    #[tokio::test]
    async fn test_buckets_do_not_leak() {
        let pool = create_test_pool().await;
        let first = SqliteServerRepository::new(pool.clone(), "first");
        let second = SqliteServerRepository::new(pool, "second");

        first.put("svc", &sample_record("svc")).await.unwrap();
        assert!(second.get("svc").await.unwrap().is_none());
        assert!(second.list().await.unwrap().unwrap().is_empty());
    }
}
