use crate::db;
use crate::repositories::{
    InMemoryServerRepository, ObjectStoreServerRepository, ServerRepository,
    SqliteServerRepository,
};
use crate::services::{
    CommandSecurityScanner, HttpSecurityScanner, RegistryService, SecurityScanner,
};
use anyhow::Context;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 600;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 900;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown STORE_BACKEND '{0}' (expected memory, sqlite or object)")]
    UnknownBackend(String),
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} must be a number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),
    #[error("No security scanner configured: set SCANNER_URL or SCANNER_COMMAND")]
    NoScanner,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    Sqlite {
        database_url: String,
    },
    Object {
        endpoint: String,
        object_key: String,
        token: Option<String>,
    },
}

impl StoreBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite { .. } => "sqlite",
            StoreBackend::Object { .. } => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerConfig {
    Http { url: String },
    Command { command_line: String },
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// May be empty; every store call then fails with a configuration error.
    pub bucket: String,
    pub store: StoreBackend,
    /// Required to serve creates; `None` when neither scanner variable is set.
    pub scanner: Option<ScannerConfig>,
    pub scan_timeout: Duration,
    pub request_timeout: Duration,
    pub host: String,
    pub port: u16,
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` uses the
    /// process environment. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = get("REGISTRY_BUCKET")
            .or_else(|| get("S3_BUCKET_NAME"))
            .unwrap_or_default();

        let store = match get("STORE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            "object" => StoreBackend::Object {
                endpoint: get("OBJECT_STORE_URL").ok_or(ConfigError::Missing("OBJECT_STORE_URL"))?,
                object_key: get("REGISTRY_OBJECT_KEY").unwrap_or_else(|| {
                    crate::repositories::object_store_repository::DEFAULT_OBJECT_KEY.to_string()
                }),
                token: get("OBJECT_STORE_TOKEN"),
            },
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let scanner = match (get("SCANNER_URL"), get("SCANNER_COMMAND")) {
            (Some(url), _) => Some(ScannerConfig::Http { url }),
            (None, Some(command_line)) => Some(ScannerConfig::Command { command_line }),
            (None, None) => None,
        };

        let scan_timeout = Duration::from_secs(parse_number(
            "SCAN_TIMEOUT_SECS",
            get("SCAN_TIMEOUT_SECS"),
            DEFAULT_SCAN_TIMEOUT_SECS,
        )?);
        let request_timeout = Duration::from_secs(parse_number(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_number("PORT", get("PORT"), 8080u16)?;

        Ok(Self {
            bucket,
            store,
            scanner,
            scan_timeout,
            request_timeout,
            host,
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub async fn build_repository(&self) -> anyhow::Result<Arc<dyn ServerRepository>> {
        let repository: Arc<dyn ServerRepository> = match &self.store {
            StoreBackend::Memory => Arc::new(InMemoryServerRepository::new(self.bucket.clone())),
            StoreBackend::Sqlite { database_url } => {
                let pool = db::create_pool(database_url)
                    .await
                    .with_context(|| format!("opening {}", database_url))?;
                Arc::new(SqliteServerRepository::new(pool, self.bucket.clone()))
            }
            StoreBackend::Object {
                endpoint,
                object_key,
                token,
            } => Arc::new(
                ObjectStoreServerRepository::new(endpoint.clone(), self.bucket.clone())?
                    .with_object_key(object_key.clone())
                    .with_token(token.clone()),
            ),
        };
        Ok(repository)
    }

    pub fn build_scanner(&self) -> anyhow::Result<Arc<dyn SecurityScanner>> {
        let scanner: Arc<dyn SecurityScanner> = match &self.scanner {
            None => return Err(ConfigError::NoScanner.into()),
            Some(ScannerConfig::Http { url }) => {
                Arc::new(HttpSecurityScanner::new(url.clone(), self.scan_timeout)?)
            }
            Some(ScannerConfig::Command { command_line }) => Arc::new(
                CommandSecurityScanner::from_command_line(command_line, self.scan_timeout)
                    .context("SCANNER_COMMAND is empty")?,
            ),
        };
        Ok(scanner)
    }

    /// Fails with `ConfigError::NoScanner` when no scanner is configured.
    pub async fn build_registry_service(&self) -> anyhow::Result<RegistryService> {
        let repository = self.build_repository().await?;
        let scanner = self.build_scanner()?;
        Ok(RegistryService::new(repository, scanner))
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}
