use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the server's source lives, e.g. `{"type": "git", "url": "https://..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub amount: f64,
}

/// Record timestamps, RFC3339 in UTC.
///
/// Both fields are optional on read so that records written by older
/// tooling (or by hand) still load. `created_at` is carried verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Free-form metadata block accepted on create/update. Only `homepage` is
/// lifted onto the record; other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerMetadata {
    #[serde(default)]
    pub homepage: Option<String>,
}

/// A registry entry, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub entrypoint: String,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_report: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub entrypoint: String,
    pub repository: Repository,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub metadata: Option<ServerMetadata>,
}

/// Partial update. Every field is independently present or absent; an absent
/// field (or an explicit JSON `null`) leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateServerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub metadata: Option<ServerMetadata>,
    #[serde(default)]
    pub security_report: Option<Value>,
}

impl UpdateServerRequest {
    /// Overlays every present field onto `record`.
    ///
    /// `name` is not applied here: a rename changes the storage
    /// key and is handled by the registry service.
    pub fn apply_to(self, record: &mut ServerRecord) {
        if let Some(version) = self.version {
            record.version = version;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(author) = self.author {
            record.author = author;
        }
        if let Some(lang) = self.lang {
            record.lang = lang;
        }
        if let Some(license) = self.license {
            record.license = license;
        }
        if let Some(entrypoint) = self.entrypoint {
            record.entrypoint = entrypoint;
        }
        if let Some(repository) = self.repository {
            record.repository = repository;
        }
        if let Some(pricing) = self.pricing {
            record.pricing = Some(pricing);
        }
        if let Some(tools) = self.tools {
            record.tools = Some(tools);
        }
        if let Some(homepage) = self.metadata.and_then(|m| m.homepage) {
            record.homepage = Some(homepage);
        }
        if let Some(report) = self.security_report {
            record.security_report = Some(report);
        }
    }

    /// The rename target, if the overlay asks for one different from `current`.
    pub fn rename_target(&self, current: &str) -> Option<&str> {
        self.name.as_deref().filter(|name| *name != current)
    }
}

/// List projection of a record. Timestamps and homepage are only returned by
/// the single-record lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub lang: String,
    pub license: String,
    pub entrypoint: String,
    pub repository: Repository,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_report: Option<Value>,
}

impl From<ServerRecord> for ServerSummary {
    fn from(r: ServerRecord) -> Self {
        ServerSummary {
            name: r.name,
            version: r.version,
            description: r.description,
            author: r.author,
            lang: r.lang,
            license: r.license,
            entrypoint: r.entrypoint,
            repository: r.repository,
            pricing: r.pricing,
            tools: r.tools,
            security_report: r.security_report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerList {
    pub total: usize,
    pub servers: Vec<ServerSummary>,
}
