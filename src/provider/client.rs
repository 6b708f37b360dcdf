//! Typed REST client for the repository platform
//!
//! All remote calls in the system go through [`ApiClient`]. Each method
//! returns `Result<T, ProviderError>` with failures already classified, so
//! callers decide between identity rotation, skipping the entity, or a
//! short backoff without inspecting HTTP plumbing.

use crate::provider::models::{
    Commit, CommitDetail, ContentEntry, Contributor, Issue, Languages, Pull, RateLimitResponse,
    Release, Repository, SearchItem, SearchResults, User,
};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Page size used for every listing endpoint
const PER_PAGE: usize = 100;

/// Classified outcome of a failed remote call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The active identity has no remaining quota
    #[error("API quota exceeded")]
    QuotaExceeded,

    /// The entity no longer exists remotely
    #[error("Entity not found")]
    NotFound,

    /// The entity exists but its payload is malformed or incomplete
    #[error("Incomplete or malformed entity: {0}")]
    Incomplete(String),

    /// The request timed out; retryable after a short pause
    #[error("Network timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Observed quota state of one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Builds the HTTP client shared by all API calls
///
/// One client is built per process; identities are switched by swapping the
/// bearer token on the [`ApiClient`], not by rebuilding the transport.
pub fn build_api_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .build()
}

/// Typed wrapper over the platform's REST API
///
/// The base URL is configurable so tests can point the client at a mock
/// server.
pub struct ApiClient {
    http: Client,
    base: Url,
    token: String,
}

impl ApiClient {
    pub fn new(http: Client, api_base: &str, token: String) -> Result<Self, ProviderError> {
        let mut base = Url::parse(api_base)?;
        // A base without a trailing slash would swallow its last path
        // segment on join().
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self { http, base, token })
    }

    /// Switches the active identity's token
    pub fn set_token(&mut self, token: String) {
        self.token = token;
    }

    /// Queries the rate-limit endpoint on behalf of an arbitrary token
    ///
    /// Used by the identity pool to probe every identity without switching
    /// the client. The rate-limit endpoint itself does not consume quota.
    pub async fn rate_limit_with_token(&self, token: &str) -> Result<QuotaStatus, ProviderError> {
        let url = self.base.join("rate_limit")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(classify_transport)?;
        let body: RateLimitResponse = decode(check_status(response).await?).await?;
        let reset_at = Utc
            .timestamp_opt(body.resources.core.reset, 0)
            .single()
            .ok_or_else(|| ProviderError::Incomplete("invalid reset timestamp".to_string()))?;
        Ok(QuotaStatus {
            remaining: body.resources.core.remaining,
            reset_at,
        })
    }

    /// Searches repositories and returns the first result page
    pub async fn search_repositories(
        &self,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<SearchItem>, ProviderError> {
        let results: SearchResults = self
            .get_json(
                "search/repositories",
                &[
                    ("q", query.to_string()),
                    ("per_page", per_page.min(PER_PAGE).to_string()),
                ],
            )
            .await?;
        Ok(results.items)
    }

    /// Fetches full repository metadata by numeric id
    pub async fn get_repository(&self, id: u64) -> Result<Repository, ProviderError> {
        self.get_json(&format!("repositories/{}", id), &[]).await
    }

    /// Lists commits, newest first, optionally bounded by a time window
    pub async fn list_commits(
        &self,
        full_name: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>, ProviderError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(since) = since {
            params.push(("since", since.to_rfc3339()));
        }
        if let Some(until) = until {
            params.push(("until", until.to_rfc3339()));
        }
        self.get_paged(&format!("repos/{}/commits", full_name), &params)
            .await
    }

    /// Fetches one commit with its per-file statuses
    pub async fn get_commit(
        &self,
        full_name: &str,
        sha: &str,
    ) -> Result<CommitDetail, ProviderError> {
        self.get_json(&format!("repos/{}/commits/{}", full_name, sha), &[])
            .await
    }

    pub async fn list_contributors(
        &self,
        full_name: &str,
    ) -> Result<Vec<Contributor>, ProviderError> {
        self.get_paged(&format!("repos/{}/contributors", full_name), &[])
            .await
    }

    pub async fn get_user(&self, login: &str) -> Result<User, ProviderError> {
        self.get_json(&format!("users/{}", login), &[]).await
    }

    /// Lists pull requests in the given state ("open", "closed", "all")
    pub async fn list_pulls(
        &self,
        full_name: &str,
        state: &str,
    ) -> Result<Vec<Pull>, ProviderError> {
        self.get_paged(
            &format!("repos/{}/pulls", full_name),
            &[("state", state.to_string())],
        )
        .await
    }

    /// Lists issues in the given state ("open", "closed")
    pub async fn list_issues(
        &self,
        full_name: &str,
        state: &str,
    ) -> Result<Vec<Issue>, ProviderError> {
        self.get_paged(
            &format!("repos/{}/issues", full_name),
            &[("state", state.to_string())],
        )
        .await
    }

    pub async fn list_releases(&self, full_name: &str) -> Result<Vec<Release>, ProviderError> {
        self.get_paged(&format!("repos/{}/releases", full_name), &[])
            .await
    }

    /// Lists branch names; only the count is used downstream
    pub async fn list_branches(
        &self,
        full_name: &str,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        self.get_paged(&format!("repos/{}/branches", full_name), &[])
            .await
    }

    pub async fn get_languages(&self, full_name: &str) -> Result<Languages, ProviderError> {
        self.get_json(&format!("repos/{}/languages", full_name), &[])
            .await
    }

    /// Fetches the readme as raw text
    pub async fn get_readme(&self, full_name: &str) -> Result<String, ProviderError> {
        let url = self.base.join(&format!("repos/{}/readme", full_name))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github.raw")
            .send()
            .await
            .map_err(classify_transport)?;
        let response = check_status(response).await?;
        response
            .text()
            .await
            .map_err(|e| ProviderError::Incomplete(e.to_string()))
    }

    /// Lists one directory level of the repository's working tree
    pub async fn list_contents(
        &self,
        full_name: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ProviderError> {
        self.get_json(&format!("repos/{}/contents/{}", full_name, path), &[])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.base.join(path)?;
        let response = self
            .http
            .get(url)
            .query(params)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(classify_transport)?;
        decode(check_status(response).await?).await
    }

    /// Follows page parameters until a short page ends the listing
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("per_page", PER_PAGE.to_string()));
            query.push(("page", page.to_string()));
            let batch: Vec<T> = self.get_json(path, &query).await?;
            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                return Ok(all);
            }
            page += 1;
        }
    }
}

/// Maps an HTTP response status to a classified provider error
///
/// The platform signals an exhausted quota with 403 or 429 plus a zeroed
/// `x-ratelimit-remaining` header; a 403 with remaining quota is some other
/// access problem and is treated as an incomplete entity.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound);
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        if status == StatusCode::TOO_MANY_REQUESTS || remaining == Some(0) {
            return Err(ProviderError::QuotaExceeded);
        }
    }

    Err(ProviderError::Incomplete(format!("HTTP {}", status)))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Incomplete(format!("decode error: {}", e)))
}

fn classify_transport(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_client(base: &str) -> ApiClient {
        ApiClient::new(build_api_client().unwrap(), base, "token-a".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_query_uses_given_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .and(header("authorization", "Bearer token-b"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"resources": {"core": {"remaining": 12, "reset": 1700000000}}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).await;
        let status = client.rate_limit_with_token("token-b").await.unwrap();
        assert_eq!(status.remaining, 12);
        assert_eq!(status.reset_at.timestamp(), 1700000000);
    }

    #[tokio::test]
    async fn test_not_found_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).await;
        let result = client.get_repository(7).await;
        assert!(matches!(result, Err(ProviderError::NotFound)));
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/7"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).await;
        let result = client.get_repository(7).await;
        assert!(matches!(result, Err(ProviderError::QuotaExceeded)));
    }

    #[tokio::test]
    async fn test_forbidden_with_quota_left_is_incomplete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/7"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "90"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).await;
        let result = client.get_repository(7).await;
        assert!(matches!(result, Err(ProviderError::Incomplete(_))));
    }

    #[tokio::test]
    async fn test_search_repositories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "created:2015-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"total_count": 2, "items": [
                    {"id": 1, "full_name": "a/x"},
                    {"id": 2, "full_name": "b/y"}
                ]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).await;
        let items = client
            .search_repositories("created:2015-06-01", 100)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].full_name, "a/x");
    }
}
