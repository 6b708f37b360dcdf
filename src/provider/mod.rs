//! Remote repository-platform client
//!
//! This module wraps the platform's REST API (GitHub-shaped) behind typed
//! methods that return explicit `Result`s. The four failure classes the
//! rest of the system cares about - quota exceeded, entity not found,
//! malformed/incomplete entity, network timeout - are separated here so
//! retry and identity-rotation logic can be written as plain loops over
//! results.

pub mod client;
pub mod models;

pub use client::{build_api_client, ApiClient, ProviderError, QuotaStatus};
pub use models::{
    Commit, CommitDetail, CommitFile, ContentEntry, Contributor, Issue, Pull, Release, Repository,
    SearchItem, User,
};
