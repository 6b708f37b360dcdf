//! Wire models for the repository platform's REST API
//!
//! Each model carries the slice of its payload the pipeline reads, plus
//! the entity's identity fields; everything else is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Full repository metadata
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
    pub size: u64,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub forks_count: u64,
    pub owner: Account,
}

/// Account summary as embedded in repository payloads
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Full account record from the users endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub public_repos: u64,
}

/// One entry of a repository search result
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: u64,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchItem>,
}

/// Commit as returned by the listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitMeta {
    pub author: CommitIdent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitIdent {
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Single commit with its file statuses
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    /// "added", "modified", "removed", "renamed"
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contributor {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pull {
    pub id: u64,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub created_at: DateTime<Utc>,
}

/// One entry of a directory listing
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    /// "file" or "dir"
    #[serde(rename = "type")]
    pub kind: String,
}

/// Per-language byte counts
pub type Languages = HashMap<String, u64>;

/// Rate-limit endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitCore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitCore {
    pub remaining: u32,
    /// Epoch seconds at which the quota resets
    pub reset: i64,
}
