//! Registry record lifecycle: create, read, list, merge-update, rename and delete.
//!
//! All state lives in the [`ServerRepository`]; the service keeps nothing
//! between calls. The store offers no transactions or compare-and-swap, so:
//!
//! - two concurrent creates of the same name can both pass the existence
//!   check, and the later write wins;
//! - two concurrent updates of the same record can lose one writer's fields;
//! - a rename deletes the old key before writing the new one. A failure (or
//!   crash) in between can leave zero records, and a failed delete followed by
//!   a successful write leaves two.
//!
//! Scans are only run on create. Updates accept a caller-supplied
//! `security_report` without rescanning.

use crate::models::{
    CreateServerRequest, Meta, ServerList, ServerRecord, ServerSummary, UpdateServerRequest,
};
use crate::repositories::{RepositoryError, ServerRepository};
use crate::services::clock::{format_timestamp, Clock, SystemClock};
use crate::services::security_scanner::{ScanResult, SecurityScanner};
use std::sync::Arc;

pub const MAX_NAME_LENGTH: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Server '{0}' not found")]
    NotFound(String),

    #[error("Server '{0}' already exists")]
    Conflict(String),

    #[error("Security scanning failed: {0}")]
    ScanFailed(String),

    #[error("Error {operation}: {source}")]
    StoreFailed {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to delete server '{name}': {source}")]
    DeleteFailed {
        name: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Invalid request: {0}")]
    InvalidInput(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

fn store_failed(operation: &'static str) -> impl FnOnce(RepositoryError) -> RegistryError {
    move |source| RegistryError::StoreFailed { operation, source }
}

pub struct RegistryService {
    repository: Arc<dyn ServerRepository>,
    scanner: Option<Arc<dyn SecurityScanner>>,
    clock: Arc<dyn Clock>,
}

impl RegistryService {
    pub fn new(repository: Arc<dyn ServerRepository>, scanner: Arc<dyn SecurityScanner>) -> Self {
        Self {
            repository,
            scanner: Some(scanner),
            clock: Arc::new(SystemClock),
        }
    }

    /// A service with no scan gateway. Every operation except create works;
    /// create fails with `ScanFailed` before anything is written.
    pub fn without_scanner(repository: Arc<dyn ServerRepository>) -> Self {
        Self {
            repository,
            scanner: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn timestamp(&self) -> String {
        format_timestamp(self.clock.now())
    }

    async fn fetch(&self, name: &str) -> RegistryResult<Option<ServerRecord>> {
        self.repository
            .get(name)
            .await
            .map_err(store_failed("fetching server"))
    }

    /// All records, optionally only those whose author matches exactly.
    /// An empty filter is the same as no filter.
    pub async fn list_servers(&self, author: Option<&str>) -> RegistryResult<ServerList> {
        let records = self
            .repository
            .list()
            .await
            .map_err(store_failed("fetching servers"))?
            .unwrap_or_default();

        let author = author.filter(|a| !a.is_empty());
        let servers: Vec<ServerSummary> = records
            .into_values()
            .filter(|record| author.map_or(true, |a| record.author == a))
            .map(ServerSummary::from)
            .collect();

        Ok(ServerList {
            total: servers.len(),
            servers,
        })
    }

    pub async fn get_server(&self, name: &str) -> RegistryResult<ServerRecord> {
        self.fetch(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub async fn create_server(&self, request: CreateServerRequest) -> RegistryResult<ServerRecord> {
        validate_name(&request.name)?;
        if request.repository.url.trim().is_empty() {
            return Err(RegistryError::InvalidInput(
                "repository.url is required".to_string(),
            ));
        }

        if self.fetch(&request.name).await?.is_some() {
            return Err(RegistryError::Conflict(request.name));
        }

        let scan = self.run_scan(&request.repository.url, &request.name).await?;

        let now = self.timestamp();
        let record = ServerRecord {
            name: request.name,
            version: request.version,
            description: request.description,
            author: request.author,
            lang: request.lang,
            license: request.license,
            entrypoint: request.entrypoint,
            repository: request.repository,
            pricing: request.pricing,
            tools: scan.tools.or(request.tools),
            security_report: scan.security_report,
            homepage: request.metadata.and_then(|m| m.homepage),
            meta: Meta {
                created_at: Some(now.clone()),
                updated_at: Some(now),
            },
        };

        self.repository
            .put(&record.name, &record)
            .await
            .map_err(store_failed("creating server"))?;

        tracing::info!("Created server '{}'", record.name);
        Ok(record)
    }

    /// Merges `overlay` into the stored record. Fields absent from the overlay
    /// keep their stored values; a differing `name` moves the record.
    pub async fn update_server(
        &self,
        name: &str,
        overlay: UpdateServerRequest,
    ) -> RegistryResult<ServerRecord> {
        let existing = self
            .fetch(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let new_name = match overlay.rename_target(name) {
            Some(target) => {
                validate_name(target)?;
                if self.fetch(target).await?.is_some() {
                    return Err(RegistryError::Conflict(target.to_string()));
                }
                Some(target.to_string())
            }
            None => None,
        };

        let mut record = existing;
        overlay.apply_to(&mut record);
        record.meta = Meta {
            created_at: record.meta.created_at.take(),
            updated_at: Some(self.timestamp()),
        };

        let key = match new_name {
            Some(new_name) => {
                if let Err(e) = self.repository.delete(name).await {
                    tracing::warn!(
                        "Could not remove '{}' while renaming to '{}': {}",
                        name,
                        new_name,
                        e
                    );
                }
                record.name = new_name.clone();
                new_name
            }
            None => name.to_string(),
        };

        self.repository
            .put(&key, &record)
            .await
            .map_err(store_failed("updating server"))?;

        if key != name {
            tracing::info!("Updated server '{}' (renamed to '{}')", name, key);
        } else {
            tracing::info!("Updated server '{}'", name);
        }
        Ok(record)
    }

    pub async fn delete_server(&self, name: &str) -> RegistryResult<()> {
        if self.fetch(name).await?.is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        self.repository
            .delete(name)
            .await
            .map_err(|source| RegistryError::DeleteFailed {
                name: name.to_string(),
                source,
            })?;

        tracing::info!("Deleted server '{}'", name);
        Ok(())
    }

    /// A scan that errors and a scan that reports `success: false` both abort
    /// the calling operation. No retries.
    async fn run_scan(&self, repository_url: &str, name: &str) -> RegistryResult<ScanResult> {
        let Some(scanner) = &self.scanner else {
            return Err(RegistryError::ScanFailed(
                "no security scanner configured".to_string(),
            ));
        };

        let result = scanner
            .scan(repository_url, name)
            .await
            .map_err(|e| {
                tracing::warn!("Security scan of {} for '{}' failed: {}", repository_url, name, e);
                RegistryError::ScanFailed(e.to_string())
            })?;

        if !result.success {
            let detail = result
                .error
                .unwrap_or_else(|| "scan reported failure".to_string());
            tracing::warn!("Security scan rejected '{}': {}", name, detail);
            return Err(RegistryError::ScanFailed(detail));
        }

        Ok(result)
    }
}

fn validate_name(name: &str) -> RegistryResult<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::InvalidInput(
            "Server name is required".to_string(),
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(RegistryError::InvalidInput(format!(
            "Server name must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }

    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(RegistryError::InvalidInput(
            "Server name must not contain '/' or control characters".to_string(),
        ));
    }

    Ok(())
}
