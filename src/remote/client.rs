//! HTTP client for the GitHub contents API.
//!
//! A single versioned document is addressed by (owner, repo, branch, path).
//! Reads work without a token (public repositories); writes always require
//! one and use the document's sha for optimistic concurrency.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::settings::ConnectionSettings;
use crate::sync::DocumentStore;

use super::types::{ContentsResponse, PutRequest, PutResponse};
use super::{decode_text, encode_text, RemoteDocument, RemoteError};

/// Default API base; overridable for tests.
pub const API_BASE: &str = "https://api.github.com";

const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct GithubClient {
    client: Client,
    base: Url,
    user_agent: String,
}

impl GithubClient {
    pub fn new() -> Self {
        Self::with_base_url(Url::parse(API_BASE).expect("default API base URL is valid"))
    }

    pub fn with_base_url(base: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base,
            user_agent: format!("brewgoal/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Build `{base}/repos/{owner}/{repo}/contents/{path}`, percent-encoding
    /// each path segment while keeping directory structure intact.
    fn contents_url(&self, settings: &ConnectionSettings, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(["repos", settings.owner.as_str(), settings.repo.as_str()]);
            segments.push("contents");
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn with_common_headers(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = request
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", &self.user_agent);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn error_from_response(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RemoteError::from_status(status, body)
}

impl DocumentStore for GithubClient {
    /// Fetch the document at `path` on the configured branch. A 404 is a
    /// normal outcome ("no remote state yet") and maps to `Ok(None)`.
    async fn get_document(
        &self,
        settings: &ConnectionSettings,
        path: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        let mut url = self.contents_url(settings, path);
        url.query_pairs_mut().append_pair("ref", &settings.branch);

        debug!("GET {}", url);
        let response = self
            .with_common_headers(self.client.get(url), settings.token.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document {} not found on remote", path);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ContentsResponse = serde_json::from_str(&body)
            .map_err(|e| RemoteError::Decode(format!("unexpected contents response: {e}")))?;
        let content = decode_text(&parsed.content)?;

        Ok(Some(RemoteDocument {
            content,
            sha: parsed.sha,
        }))
    }

    /// Create or update the document at `path`. `expected_sha` must carry
    /// the current sha when the document already exists; the API rejects a
    /// stale or missing sha with 409, surfaced as a version conflict.
    async fn put_document(
        &self,
        settings: &ConnectionSettings,
        path: &str,
        content: &str,
        expected_sha: Option<&str>,
    ) -> Result<RemoteDocument, RemoteError> {
        let token = settings
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RemoteError::MissingToken)?;

        let url = self.contents_url(settings, path);
        let body = PutRequest {
            message: format!("Update progress ({})", Utc::now().to_rfc3339()),
            content: encode_text(content),
            branch: &settings.branch,
            sha: expected_sha,
        };

        debug!("PUT {} (expected sha: {:?})", url, expected_sha);
        let response = self
            .with_common_headers(self.client.put(url), Some(token))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        let parsed: PutResponse = serde_json::from_str(&body)
            .map_err(|e| RemoteError::Decode(format!("unexpected commit response: {e}")))?;

        Ok(RemoteDocument {
            content: content.to_string(),
            sha: parsed.content.sha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ConnectionSettings {
        let mut s = ConnectionSettings::default();
        s.owner = "alice".to_string();
        s.repo = "brew-goal".to_string();
        s.branch = "main".to_string();
        s
    }

    #[test]
    fn contents_url_includes_owner_repo_and_path() {
        let client = GithubClient::new();
        let url = client.contents_url(&settings(), "progress.json");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/alice/brew-goal/contents/progress.json"
        );
    }

    #[test]
    fn contents_url_keeps_directories_and_encodes_segments() {
        let client = GithubClient::new();
        let url = client.contents_url(&settings(), "data/brew goal.json");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/alice/brew-goal/contents/data/brew%20goal.json"
        );
    }
}
