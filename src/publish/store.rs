//! Remote document stores.
//!
//! The destination is an external service with no native locking; conflicts
//! are detected by comparing an opaque version token, never by value.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::DestinationConfig;
use crate::error::PublishError;

/// A read of the remote document: body plus opaque version token.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub body: String,
    pub version: String,
}

/// Remote canonical document storage with optimistic concurrency control.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable destination label for messages and errors.
    fn destination(&self) -> String;

    /// Public pointer to the published artifact, if one exists.
    fn page_url(&self) -> Option<String> {
        None
    }

    /// Fetch the current body and version token.
    async fn read(&self) -> Result<RemoteDocument, PublishError>;

    /// Write `body`, expecting the remote to still be at `expected_version`.
    ///
    /// Returns the new version token (the content fingerprint). Fails with
    /// `PublishError::Conflict` when the remote moved in between.
    async fn write(
        &self,
        body: &str,
        expected_version: &str,
        message: &str,
    ) -> Result<String, PublishError>;
}

// ── GitHub ──────────────────────────────────────────────────────────

/// GitHub contents-API store. The blob SHA is the version token; the commit
/// SHA is the returned fingerprint.
pub struct GitHubStore {
    client: reqwest::Client,
    repo: String,
    path: String,
    branch: Option<String>,
    token: SecretString,
    committer_name: String,
    committer_email: String,
    page: Option<String>,
}

impl GitHubStore {
    pub fn new(config: &DestinationConfig, token: SecretString, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feed-curator/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            repo: config.repo.clone(),
            path: config.path.clone(),
            branch: config.branch.clone(),
            token,
            committer_name: config.committer_name.clone(),
            committer_email: config.committer_email.clone(),
            page: config.page_url.clone(),
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/contents/{}",
            self.repo, self.path
        )
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> PublishError {
        PublishError::Unavailable {
            destination: self.destination(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for GitHubStore {
    fn destination(&self) -> String {
        format!("{}:{}", self.repo, self.path)
    }

    fn page_url(&self) -> Option<String> {
        self.page.clone()
    }

    async fn read(&self) -> Result<RemoteDocument, PublishError> {
        let mut request = self
            .client
            .get(self.contents_url())
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/vnd.github+json");
        if let Some(ref branch) = self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }

        let response = request.send().await.map_err(|e| self.unavailable(e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // File does not exist yet; the first write creates it.
            return Ok(RemoteDocument {
                body: String::new(),
                version: String::new(),
            });
        }
        if !response.status().is_success() {
            return Err(self.unavailable(format!("HTTP {}", response.status())));
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("unparseable contents response: {e}")))?;

        let encoded: String = contents
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| self.unavailable(format!("undecodable content: {e}")))?;
        let body = String::from_utf8(raw)
            .map_err(|e| self.unavailable(format!("content is not UTF-8: {e}")))?;

        Ok(RemoteDocument {
            body,
            version: contents.sha,
        })
    }

    async fn write(
        &self,
        body: &str,
        expected_version: &str,
        message: &str,
    ) -> Result<String, PublishError> {
        let committer = Committer {
            name: &self.committer_name,
            email: &self.committer_email,
        };
        let payload = PutRequest {
            message,
            content: BASE64.encode(body.as_bytes()),
            sha: (!expected_version.is_empty()).then_some(expected_version),
            branch: self.branch.as_deref(),
            committer: committer.clone(),
            author: committer,
        };

        let response = self
            .client
            .put(self.contents_url())
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        // The contents API reports a stale SHA as 409.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(PublishError::Conflict {
                destination: self.destination(),
            });
        }
        if !response.status().is_success() {
            return Err(self.unavailable(format!("HTTP {}", response.status())));
        }

        let put: PutResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("unparseable commit response: {e}")))?;

        tracing::info!(
            destination = %self.destination(),
            commit = %put.commit.sha,
            "Wrote destination document"
        );
        Ok(put.commit.sha)
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    committer: Committer<'a>,
    author: Committer<'a>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

// ── In-memory ───────────────────────────────────────────────────────

/// In-memory store for tests and dry runs. The version token is a write
/// counter.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    body: String,
    version: u64,
    staged_edits: VecDeque<String>,
}

impl MemoryStore {
    pub fn new(initial: &str) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                body: initial.to_string(),
                version: 0,
                staged_edits: VecDeque::new(),
            }),
        }
    }

    pub fn body(&self) -> String {
        self.state.lock().unwrap().body.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.lock().unwrap().version
    }

    /// Stage a concurrent edit: it is appended to the body (bumping the
    /// version) immediately before the next write is validated, so that
    /// write observes a moved version token.
    pub fn stage_external_edit(&self, appended: &str) {
        self.state
            .lock()
            .unwrap()
            .staged_edits
            .push_back(appended.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn destination(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self) -> Result<RemoteDocument, PublishError> {
        let state = self.state.lock().unwrap();
        Ok(RemoteDocument {
            body: state.body.clone(),
            version: state.version.to_string(),
        })
    }

    async fn write(
        &self,
        body: &str,
        expected_version: &str,
        _message: &str,
    ) -> Result<String, PublishError> {
        let mut state = self.state.lock().unwrap();
        if let Some(edit) = state.staged_edits.pop_front() {
            state.body.push_str(&edit);
            state.version += 1;
        }
        if expected_version != state.version.to_string() {
            return Err(PublishError::Conflict {
                destination: "memory".to_string(),
            });
        }
        state.body = body.to_string();
        state.version += 1;
        Ok(state.version.to_string())
    }
}
