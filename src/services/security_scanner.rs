//! Security scan gateway clients.
//!
//! A scan clones the repository, runs the configured analysers and discovers
//! the tools the server exposes. Scans routinely take minutes, so callers
//! should budget timeouts accordingly.
//!
//! Two transports are provided:
//!
//! - [`HttpSecurityScanner`] posts `{"repo_url", "server_name"}` to
//!   `{base_url}/scan` on a scan service.
//! - [`CommandSecurityScanner`] runs a local helper program, passing
//!   `{"function": "scan_repository", "args": {...}}` as its only argument and
//!   reading the JSON result from stdout.
//!
//! Both return the helper's [`ScanResult`] as-is. Deciding what a failed scan
//! means is left to the registry service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_report: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scan request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Scan timed out after {0}s")]
    Timeout(u64),

    #[error("Scan gateway returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Scan helper failed: {0}")]
    Command(String),

    #[error("Invalid scan response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SecurityScanner: Send + Sync {
    async fn scan(&self, repository_url: &str, server_name: &str)
        -> Result<ScanResult, ScanError>;
}

#[derive(Serialize)]
struct ScanRequest<'a> {
    repo_url: &'a str,
    server_name: &'a str,
}

#[derive(Clone)]
pub struct HttpSecurityScanner {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSecurityScanner {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout,
        })
    }

    fn scan_url(&self) -> String {
        format!("{}/scan", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SecurityScanner for HttpSecurityScanner {
    async fn scan(
        &self,
        repository_url: &str,
        server_name: &str,
    ) -> Result<ScanResult, ScanError> {
        let request = ScanRequest {
            repo_url: repository_url,
            server_name,
        };

        let response = self
            .client
            .post(self.scan_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScanError::Timeout(self.timeout.as_secs())
                } else {
                    ScanError::Transport(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ScanError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ScanError::InvalidResponse(format!("{}; raw: {}", e, body)))
    }
}

/// Runs a local scan helper, e.g. `python3 helpers/security_helper.py`.
#[derive(Debug, Clone)]
pub struct CommandSecurityScanner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSecurityScanner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Splits a whitespace separated command line. Returns `None` when blank.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }
}

#[async_trait]
impl SecurityScanner for CommandSecurityScanner {
    async fn scan(
        &self,
        repository_url: &str,
        server_name: &str,
    ) -> Result<ScanResult, ScanError> {
        let payload = json!({
            "function": "scan_repository",
            "args": {
                "repo_url": repository_url,
                "server_name": server_name,
            },
        });

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .arg(payload.to_string())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ScanError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| ScanError::Command(format!("could not run {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(ScanError::Command(format!(
                "{} exited with {}; output: {}",
                self.program, output.status, detail
            )));
        }

        serde_json::from_str(stdout.trim())
            .map_err(|e| ScanError::InvalidResponse(format!("{}; raw: {}", e, stdout.trim())))
    }
}
