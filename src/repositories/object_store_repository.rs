//! Registry storage on an S3-compatible HTTP object store.
//!
//! The whole registry lives in a single JSON document (by default `mcp.json`)
//! addressed path-style as `{endpoint}/{bucket}/{object_key}`:
//!
//! ```json
//! { "servers": { "weather": { "name": "weather", ... } } }
//! ```
//!
//! Documents written by older tooling as `{"servers": [record, ...]}` are
//! indexed by each record's `name` on read and keep that layout on write.
//!
//! Per-key writes are read-modify-write cycles over that document. When the
//! store hands out an `ETag` the write is conditional (`If-Match`, or
//! `If-None-Match: *` when creating the document) and a `412` restarts the
//! cycle, so two writers touching different keys do not silently drop each
//! other's entries. Nothing here makes the registry service's own
//! check-then-write sequences atomic.

use super::server_repository::{
    require_bucket, RepositoryError, RepositoryResult, ServerRepository,
};
use crate::models::ServerRecord;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_OBJECT_KEY: &str = "mcp.json";
const MAX_WRITE_ATTEMPTS: usize = 3;

/// How the document stores its entries. Older tooling writes
/// `{"servers": [record, ...]}`; this adapter creates `{"servers": {name: record}}`.
/// A document is written back in the layout it was read in.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Layout {
    #[default]
    Keyed,
    Listed,
}

#[derive(Debug, Default)]
struct RegistryDocument {
    // Raw values so that entries this version cannot parse survive rewrites.
    servers: Map<String, Value>,
    // Listed entries without a usable `name`; written back untouched.
    unnamed: Vec<Value>,
    // Top-level keys other than `servers`.
    extra: Map<String, Value>,
    layout: Layout,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    servers: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RegistryDocument {
    fn parse(bytes: &[u8]) -> RepositoryResult<Self> {
        let raw: RawDocument = serde_json::from_slice(bytes)?;

        let mut document = RegistryDocument {
            extra: raw.extra,
            ..Default::default()
        };

        match raw.servers {
            Value::Null => {}
            Value::Object(servers) => document.servers = servers,
            Value::Array(entries) => {
                document.layout = Layout::Listed;
                for entry in entries {
                    match entry.get("name").and_then(Value::as_str) {
                        Some(name) => {
                            document.servers.insert(name.to_string(), entry);
                        }
                        None => document.unnamed.push(entry),
                    }
                }
            }
            other => {
                return Err(RepositoryError::Serialization(
                    <serde_json::Error as serde::de::Error>::custom(format!(
                        "`servers` must be an object or an array, got {}",
                        other
                    )),
                ))
            }
        }

        Ok(document)
    }

    fn to_bytes(&self) -> RepositoryResult<Vec<u8>> {
        let servers = match self.layout {
            Layout::Keyed => Value::Object(self.servers.clone()),
            Layout::Listed => Value::Array(
                self.servers
                    .values()
                    .chain(self.unnamed.iter())
                    .cloned()
                    .collect(),
            ),
        };

        let mut root = self.extra.clone();
        root.insert("servers".to_string(), servers);
        Ok(serde_json::to_vec_pretty(&Value::Object(root))?)
    }
}

struct FetchedDocument {
    document: RegistryDocument,
    etag: Option<String>,
}

enum Precondition {
    IfMatch(String),
    IfAbsent,
    Unconditional,
}

#[derive(Clone)]
pub struct ObjectStoreServerRepository {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    object_key: String,
    token: Option<String>,
}

impl ObjectStoreServerRepository {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> RepositoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            object_key: DEFAULT_OBJECT_KEY.to_string(),
            token: None,
        })
    }

    pub fn with_object_key(mut self, object_key: impl Into<String>) -> Self {
        self.object_key = object_key.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn document_url(&self) -> RepositoryResult<String> {
        let bucket = require_bucket(&self.bucket)?;
        let key = self
            .object_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(bucket),
            key
        ))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_document(&self) -> RepositoryResult<Option<FetchedDocument>> {
        let url = self.document_url()?;
        let response = self.authorize(self.client.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let document = RegistryDocument::parse(&bytes)?;

        Ok(Some(FetchedDocument { document, etag }))
    }

    /// Returns `false` when the store rejected the write's precondition.
    async fn write_document(
        &self,
        document: &RegistryDocument,
        precondition: Precondition,
    ) -> RepositoryResult<bool> {
        let url = self.document_url()?;
        let body = document.to_bytes()?;

        let mut request = self
            .authorize(self.client.put(&url))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        request = match precondition {
            Precondition::IfMatch(etag) => request.header(header::IF_MATCH, etag),
            Precondition::IfAbsent => request.header(header::IF_NONE_MATCH, "*"),
            Precondition::Unconditional => request,
        };

        let response = request.send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(true)
    }

    /// Applies `change` to the document's server map and writes it back.
    /// `change` returns `false` when there is nothing to write.
    async fn modify<F>(&self, name: &str, change: F) -> RepositoryResult<()>
    where
        F: Fn(&mut Map<String, Value>) -> bool + Send + Sync,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (mut document, precondition) = match self.fetch_document().await? {
                Some(FetchedDocument {
                    document,
                    etag: Some(etag),
                }) => (document, Precondition::IfMatch(etag)),
                Some(FetchedDocument { document, etag: None }) => {
                    (document, Precondition::Unconditional)
                }
                None => (RegistryDocument::default(), Precondition::IfAbsent),
            };

            if !change(&mut document.servers) {
                return Ok(());
            }

            if self.write_document(&document, precondition).await? {
                return Ok(());
            }

            tracing::debug!(
                "Registry document changed while writing '{}' (attempt {}/{})",
                name,
                attempt,
                MAX_WRITE_ATTEMPTS
            );
        }

        Err(RepositoryError::WriteContention {
            key: name.to_string(),
        })
    }
}

async fn unexpected_status(response: reqwest::Response) -> RepositoryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RepositoryError::UnexpectedStatus { status, body }
}

#[async_trait]
impl ServerRepository for ObjectStoreServerRepository {
    async fn get(&self, name: &str) -> RepositoryResult<Option<ServerRecord>> {
        let Some(mut fetched) = self.fetch_document().await? else {
            return Ok(None);
        };

        match fetched.document.servers.remove(name) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, name: &str, record: &ServerRecord) -> RepositoryResult<()> {
        let value = serde_json::to_value(record)?;
        self.modify(name, |servers| {
            servers.insert(name.to_string(), value.clone());
            true
        })
        .await
    }

    async fn delete(&self, name: &str) -> RepositoryResult<()> {
        self.modify(name, |servers| servers.remove(name).is_some())
            .await
    }

    /// Best-effort: an unreadable document lists as "no mapping" and
    /// unreadable entries are skipped. `get` and writes report the same
    /// document as a `Serialization` error.
    async fn list(&self) -> RepositoryResult<Option<BTreeMap<String, ServerRecord>>> {
        let fetched = match self.fetch_document().await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => return Ok(None),
            Err(RepositoryError::Serialization(e)) => {
                tracing::warn!("Registry document is malformed: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut servers = BTreeMap::new();
        for (name, value) in fetched.document.servers {
            match serde_json::from_value::<ServerRecord>(value) {
                Ok(record) => {
                    servers.insert(name, record);
                }
                Err(e) => tracing::warn!("Skipping malformed registry entry '{}': {}", name, e),
            }
        }

        Ok(Some(servers))
    }
}
