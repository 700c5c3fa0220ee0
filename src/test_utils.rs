pub mod test_helpers {
    use crate::models::{CreateServerRequest, Meta, Pricing, Repository, ServerRecord};
    use crate::repositories::{
        InMemoryServerRepository, RepositoryError, RepositoryResult, ServerRepository,
    };
    use crate::services::{Clock, ScanError, ScanResult, SecurityScanner};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::{json, Value};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when a test needs to reopen the same database
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let database_url = sqlite_url(&temp_file)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    pub fn sqlite_url(file: &NamedTempFile) -> Result<String, sqlx::Error> {
        let db_path = file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        Ok(format!("sqlite://{}", db_path))
    }

    /// A fully populated record, as if created on 2026-01-01.
    pub fn sample_record(name: &str) -> ServerRecord {
        ServerRecord {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: format!("{} server", name),
            author: "alice".to_string(),
            lang: "python".to_string(),
            license: "MIT".to_string(),
            entrypoint: "main.py".to_string(),
            repository: Repository {
                kind: "git".to_string(),
                url: format!("https://github.com/alice/{}", name),
            },
            pricing: Some(Pricing {
                currency: "USD".to_string(),
                amount: 5.0,
            }),
            tools: Some(json!({"names": ["lookup"], "count": 1})),
            security_report: Some(json!({"summary": {"critical": 0}})),
            homepage: Some(format!("https://{}.example", name)),
            meta: Meta {
                created_at: Some("2026-01-01T00:00:00Z".to_string()),
                updated_at: Some("2026-01-01T00:00:00Z".to_string()),
            },
        }
    }

    pub fn create_request(name: &str, repository_url: &str) -> CreateServerRequest {
        CreateServerRequest {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: "Test server".to_string(),
            author: "alice".to_string(),
            lang: "python".to_string(),
            license: "MIT".to_string(),
            entrypoint: "main.py".to_string(),
            repository: Repository {
                kind: "git".to_string(),
                url: repository_url.to_string(),
            },
            pricing: None,
            tools: None,
            metadata: None,
        }
    }

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Panics on an unparsable timestamp; test-only.
        pub fn at(rfc3339: &str) -> Self {
            let now = match DateTime::parse_from_rfc3339(rfc3339) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(e) => panic!("bad test timestamp {}: {}", rfc3339, e),
            };
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            *now += Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    enum StubOutcome {
        Pass {
            tools: Option<Value>,
            security_report: Option<Value>,
        },
        Reject(String),
        Unreachable,
    }

    /// Scan gateway with a fixed answer that remembers who asked.
    pub struct StubSecurityScanner {
        outcome: StubOutcome,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubSecurityScanner {
        pub fn passing(tools: Option<Value>, security_report: Option<Value>) -> Self {
            Self::with_outcome(StubOutcome::Pass {
                tools,
                security_report,
            })
        }

        pub fn rejecting(error: &str) -> Self {
            Self::with_outcome(StubOutcome::Reject(error.to_string()))
        }

        pub fn unreachable() -> Self {
            Self::with_outcome(StubOutcome::Unreachable)
        }

        fn with_outcome(outcome: StubOutcome) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// `(repository_url, server_name)` for every scan requested so far.
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl SecurityScanner for StubSecurityScanner {
        async fn scan(
            &self,
            repository_url: &str,
            server_name: &str,
        ) -> Result<ScanResult, ScanError> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((repository_url.to_string(), server_name.to_string()));

            match &self.outcome {
                StubOutcome::Pass {
                    tools,
                    security_report,
                } => Ok(ScanResult {
                    success: true,
                    tools: tools.clone(),
                    security_report: security_report.clone(),
                    error: None,
                }),
                StubOutcome::Reject(error) => Ok(ScanResult {
                    success: false,
                    error: Some(error.clone()),
                    ..Default::default()
                }),
                StubOutcome::Unreachable => Err(ScanError::Command(
                    "scan helper not reachable".to_string(),
                )),
            }
        }
    }

    /// In-memory store whose writes can be switched to fail.
    #[derive(Default)]
    pub struct FlakyServerRepository {
        pub inner: InMemoryServerRepository,
        fail_puts: AtomicBool,
        fail_deletes: AtomicBool,
        puts: AtomicUsize,
    }

    impl FlakyServerRepository {
        pub fn new(inner: InMemoryServerRepository) -> Self {
            Self {
                inner,
                ..Default::default()
            }
        }

        pub fn fail_puts(&self, fail: bool) {
            self.fail_puts.store(fail, Ordering::SeqCst);
        }

        pub fn fail_deletes(&self, fail: bool) {
            self.fail_deletes.store(fail, Ordering::SeqCst);
        }

        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        fn injected() -> RepositoryError {
            RepositoryError::UnexpectedStatus {
                status: 503,
                body: "injected failure".to_string(),
            }
        }
    }

    #[async_trait]
    impl ServerRepository for FlakyServerRepository {
        async fn get(&self, name: &str) -> RepositoryResult<Option<ServerRecord>> {
            self.inner.get(name).await
        }

        async fn put(&self, name: &str, record: &ServerRecord) -> RepositoryResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.inner.put(name, record).await
        }

        async fn delete(&self, name: &str) -> RepositoryResult<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.inner.delete(name).await
        }

        async fn list(&self) -> RepositoryResult<Option<BTreeMap<String, ServerRecord>>> {
            self.inner.list().await
        }
    }
}

// Re-export commonly used test functions at module level for convenience
// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
