use serial_test::serial;
use std::{collections::HashMap, env, time::Duration};
use superbox::config::{ConfigError, RegistryConfig, ScannerConfig, StoreBackend};

const KEYS: &[&str] = &[
    "REGISTRY_BUCKET",
    "S3_BUCKET_NAME",
    "STORE_BACKEND",
    "DATABASE_URL",
    "OBJECT_STORE_URL",
    "OBJECT_STORE_TOKEN",
    "REGISTRY_OBJECT_KEY",
    "SCANNER_URL",
    "SCANNER_COMMAND",
    "SCAN_TIMEOUT_SECS",
    "REQUEST_TIMEOUT_SECS",
    "HOST",
    "PORT",
];

#[derive(Default)]
struct EnvGuard {
    original: HashMap<String, Option<String>>,
}

impl EnvGuard {
    fn cleared() -> Self {
        let mut guard = Self::default();
        for key in KEYS {
            guard.remove(key);
        }
        guard
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::set_var(key, value.into());
    }

    fn remove(&mut self, key: &str) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::remove_var(key);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.original.drain() {
            match value {
                Some(v) => env::set_var(&key, v),
                None => env::remove_var(&key),
            }
        }
    }
}

#[test]
#[serial]
fn test_object_store_configuration_from_env() {
    let mut env_guard = EnvGuard::cleared();
    env_guard.set("REGISTRY_BUCKET", "superbox-registry");
    env_guard.set("STORE_BACKEND", "object");
    env_guard.set("OBJECT_STORE_URL", "http://localhost:9000");
    env_guard.set("OBJECT_STORE_TOKEN", "token");
    env_guard.set("SCANNER_URL", "http://localhost:7000");
    env_guard.set("SCAN_TIMEOUT_SECS", "120");
    env_guard.set("HOST", "0.0.0.0");
    env_guard.set("PORT", "9090");

    let config = RegistryConfig::from_env().unwrap();

    assert_eq!(config.bucket, "superbox-registry");
    assert_eq!(
        config.store,
        StoreBackend::Object {
            endpoint: "http://localhost:9000".to_string(),
            object_key: "mcp.json".to_string(),
            token: Some("token".to_string()),
        }
    );
    assert_eq!(
        config.scanner,
        Some(ScannerConfig::Http {
            url: "http://localhost:7000".to_string()
        })
    );
    assert_eq!(config.scan_timeout, Duration::from_secs(120));
    assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9090");
}

#[test]
#[serial]
fn test_http_scanner_wins_over_command() {
    let mut env_guard = EnvGuard::cleared();
    env_guard.set("STORE_BACKEND", "memory");
    env_guard.set("SCANNER_URL", "http://scanner");
    env_guard.set("SCANNER_COMMAND", "python3 helper.py");

    let config = RegistryConfig::from_env().unwrap();
    assert!(matches!(config.scanner, Some(ScannerConfig::Http { .. })));
}

#[test]
#[serial]
fn test_blank_values_count_as_unset() {
    let mut env_guard = EnvGuard::cleared();
    env_guard.set("STORE_BACKEND", "sqlite");
    env_guard.set("DATABASE_URL", "   ");
    env_guard.set("SCANNER_URL", "http://scanner");

    assert!(matches!(
        RegistryConfig::from_env(),
        Err(ConfigError::Missing("DATABASE_URL"))
    ));
}

#[tokio::test]
#[serial]
async fn test_sqlite_service_from_env() {
    let mut env_guard = EnvGuard::cleared();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("registry.db");

    env_guard.set("REGISTRY_BUCKET", "registry");
    env_guard.set("DATABASE_URL", format!("sqlite://{}", db_path.display()));
    env_guard.set("SCANNER_COMMAND", "python3 helpers/security_helper.py");

    let config = RegistryConfig::from_env().unwrap();
    let service = config.build_registry_service().await.unwrap();

    assert_eq!(service.list_servers(None).await.unwrap().total, 0);
    assert!(db_path.exists());
}
