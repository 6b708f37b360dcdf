//! Lazily fetched, per-entity-cached view of one repository
//!
//! Listings are cached inside the view, which lives no longer than one
//! classification or one feature row; nothing survives to the next
//! candidate.

use crate::provider::models::Languages;
use crate::provider::{ApiClient, Commit, Contributor, ProviderError, Repository, User};
use chrono::{DateTime, Duration, Utc};
use regex::RegexSet;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Trailing window, in days, that anchors event counts at the last commit
pub const TRAILING_WINDOW_DAYS: i64 = 730;

/// Directory names excluded from working-tree file listings
///
/// Vendored or generated trees would dominate the migration heuristic and
/// the file-presence checks.
const VENDOR_DIR_PATTERNS: &[&str] = &[
    r"(^|/)vendor(s)?$",
    r"(^|/)node_modules$",
    r"(^|/)third[-_]?party$",
    r"(^|/)extern(al)?(s)?$",
    r"(^|/)dist$",
    r"(^|/)build$",
    r"(^|/)\.[^/]+$",
];

fn vendor_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| RegexSet::new(VENDOR_DIR_PATTERNS).expect("static patterns are valid"))
}

/// Whether a directory path is vendored/generated and should be skipped
pub fn is_vendor_path(path: &str) -> bool {
    vendor_patterns().is_match(path)
}

pub struct RepoView {
    repo: Repository,
    commits: Option<Vec<Commit>>,
    files: Option<Vec<String>>,
    dirs: Option<Vec<String>>,
    contributors: Option<Vec<Contributor>>,
    languages: Option<Languages>,
    owner: Option<User>,
}

impl RepoView {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            commits: None,
            files: None,
            dirs: None,
            contributors: None,
            languages: None,
            owner: None,
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn id(&self) -> u64 {
        self.repo.id
    }

    pub fn full_name(&self) -> &str {
        &self.repo.full_name
    }

    /// All commits, newest first, fetched once per view
    pub async fn commits(&mut self, api: &ApiClient) -> Result<&[Commit], ProviderError> {
        if self.commits.is_none() {
            self.commits = Some(
                api.list_commits(&self.repo.full_name, None, None)
                    .await?,
            );
        }
        Ok(self.commits.as_deref().unwrap_or_default())
    }

    pub async fn last_commit_at(&mut self, api: &ApiClient) -> Result<DateTime<Utc>, ProviderError> {
        let commits = self.commits(api).await?;
        commits
            .first()
            .map(|commit| commit.commit.author.date)
            .ok_or_else(|| ProviderError::Incomplete("repository has no commits".to_string()))
    }

    pub async fn first_commit_at(
        &mut self,
        api: &ApiClient,
    ) -> Result<DateTime<Utc>, ProviderError> {
        let commits = self.commits(api).await?;
        commits
            .last()
            .map(|commit| commit.commit.author.date)
            .ok_or_else(|| ProviderError::Incomplete("repository has no commits".to_string()))
    }

    /// Active development span in days, first commit to last commit
    pub async fn development_days(&mut self, api: &ApiClient) -> Result<i64, ProviderError> {
        let last = self.last_commit_at(api).await?;
        let first = self.first_commit_at(api).await?;
        Ok((last - first).num_days())
    }

    pub async fn last_commit_age_days(&mut self, api: &ApiClient) -> Result<i64, ProviderError> {
        let last = self.last_commit_at(api).await?;
        Ok((Utc::now() - last).num_days())
    }

    /// Whether any commit happened within the trailing `days`
    pub async fn commit_within_days(
        &mut self,
        api: &ApiClient,
        days: i64,
    ) -> Result<bool, ProviderError> {
        let threshold = Utc::now() - Duration::days(days);
        let commits = self.commits(api).await?;
        Ok(commits
            .iter()
            .any(|commit| commit.commit.author.date > threshold))
    }

    /// Commits inside the trailing window anchored at the last commit
    pub async fn commits_count(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        let until = self.last_commit_at(api).await?;
        let since = until - Duration::days(TRAILING_WINDOW_DAYS);
        let commits = self.commits(api).await?;
        Ok(commits
            .iter()
            .filter(|commit| within(commit.commit.author.date, since, until))
            .count() as u64)
    }

    /// Commit count of the single most active author
    pub async fn commits_by_top_dev(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        let commits = self.commits(api).await?;
        let mut per_author: HashMap<&str, u64> = HashMap::new();
        for commit in commits {
            *per_author.entry(commit.commit.author.name.as_str()).or_default() += 1;
        }
        Ok(per_author.values().copied().max().unwrap_or(0))
    }

    /// Walks the working tree once, breadth-first, recording files and
    /// directories separately; vendored trees are recorded but not entered
    async fn walk_tree(&mut self, api: &ApiClient) -> Result<(), ProviderError> {
        if self.files.is_some() {
            return Ok(());
        }
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        let mut pending_dirs = vec![String::new()];
        while let Some(dir) = pending_dirs.pop() {
            let entries = api.list_contents(&self.repo.full_name, &dir).await?;
            for entry in entries {
                match entry.kind.as_str() {
                    "file" => files.push(entry.path),
                    "dir" => {
                        if !is_vendor_path(&entry.path) {
                            pending_dirs.push(entry.path.clone());
                        }
                        dirs.push(entry.path);
                    }
                    _ => {}
                }
            }
        }
        self.files = Some(files);
        self.dirs = Some(dirs);
        Ok(())
    }

    /// Working-tree file paths, excluding vendored trees
    pub async fn files(&mut self, api: &ApiClient) -> Result<&[String], ProviderError> {
        self.walk_tree(api).await?;
        Ok(self.files.as_deref().unwrap_or_default())
    }

    /// Working-tree directory paths
    pub async fn dirs(&mut self, api: &ApiClient) -> Result<&[String], ProviderError> {
        self.walk_tree(api).await?;
        Ok(self.dirs.as_deref().unwrap_or_default())
    }

    /// Whether any working-tree entry's base name matches one of `names`
    ///
    /// A `tests/` or `docs/` directory is as much a signal as a file of
    /// that name, so both listings are consulted.
    pub async fn has_file_named(
        &mut self,
        api: &ApiClient,
        names: &[&str],
    ) -> Result<bool, ProviderError> {
        self.walk_tree(api).await?;
        let files = self.files.as_deref().unwrap_or_default();
        let dirs = self.dirs.as_deref().unwrap_or_default();
        Ok(files.iter().chain(dirs.iter()).any(|path| {
            let base = path.rsplit('/').next().unwrap_or(path).to_lowercase();
            let stem = base.split('.').next().unwrap_or(&base);
            names.iter().any(|name| *name == base || *name == stem)
        }))
    }

    pub async fn contributors(&mut self, api: &ApiClient) -> Result<&[Contributor], ProviderError> {
        if self.contributors.is_none() {
            self.contributors = Some(api.list_contributors(&self.repo.full_name).await?);
        }
        Ok(self.contributors.as_deref().unwrap_or_default())
    }

    pub async fn contributors_count(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        Ok(self.contributors(api).await?.len() as u64)
    }

    pub async fn languages(&mut self, api: &ApiClient) -> Result<&Languages, ProviderError> {
        if self.languages.is_none() {
            self.languages = Some(api.get_languages(&self.repo.full_name).await?);
        }
        Ok(self.languages.as_ref().unwrap())
    }

    /// Sum of per-language byte counts
    pub async fn code_length(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        Ok(self.languages(api).await?.values().sum())
    }

    /// Readme text; a repository without a readme is not an error
    pub async fn readme_text(
        &mut self,
        api: &ApiClient,
    ) -> Result<Option<String>, ProviderError> {
        match api.get_readme(&self.repo.full_name).await {
            Ok(text) => Ok(Some(text)),
            Err(ProviderError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn owner_user(&mut self, api: &ApiClient) -> Result<&User, ProviderError> {
        if self.owner.is_none() {
            self.owner = Some(api.get_user(&self.repo.owner.login).await?);
        }
        Ok(self.owner.as_ref().unwrap())
    }

    pub async fn owner_account_age_days(
        &mut self,
        api: &ApiClient,
    ) -> Result<i64, ProviderError> {
        let owner = self.owner_user(api).await?;
        Ok((Utc::now() - owner.created_at).num_days())
    }

    /// Mean account age, in days, across all contributors
    pub async fn avg_dev_account_age(&mut self, api: &ApiClient) -> Result<f64, ProviderError> {
        let logins: Vec<String> = self
            .contributors(api)
            .await?
            .iter()
            .map(|contributor| contributor.login.clone())
            .collect();
        if logins.is_empty() {
            return Ok(0.0);
        }
        let mut total_days = 0i64;
        for login in &logins {
            let user = api.get_user(login).await?;
            total_days += (Utc::now() - user.created_at).num_days();
        }
        Ok(total_days as f64 / logins.len() as f64)
    }

    pub async fn devs_followers_avg(&mut self, api: &ApiClient) -> Result<f64, ProviderError> {
        self.devs_count_avg(api, |user| user.followers).await
    }

    pub async fn devs_following_avg(&mut self, api: &ApiClient) -> Result<f64, ProviderError> {
        self.devs_count_avg(api, |user| user.following).await
    }

    async fn devs_count_avg(
        &mut self,
        api: &ApiClient,
        field: fn(&User) -> u64,
    ) -> Result<f64, ProviderError> {
        let logins: Vec<String> = self
            .contributors(api)
            .await?
            .iter()
            .map(|contributor| contributor.login.clone())
            .collect();
        if logins.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0u64;
        for login in &logins {
            total += field(&api.get_user(login).await?);
        }
        Ok(total as f64 / logins.len() as f64)
    }

    /// Pulls in the given state created inside the trailing window
    pub async fn pulls_count(
        &mut self,
        api: &ApiClient,
        state: &str,
    ) -> Result<u64, ProviderError> {
        let until = self.last_commit_at(api).await?;
        let since = until - Duration::days(TRAILING_WINDOW_DAYS);
        let pulls = api.list_pulls(&self.repo.full_name, state).await?;
        Ok(pulls
            .iter()
            .filter(|pull| within(pull.created_at, since, until))
            .count() as u64)
    }

    /// Issues in the given state created inside the trailing window
    pub async fn issues_count(
        &mut self,
        api: &ApiClient,
        state: &str,
    ) -> Result<u64, ProviderError> {
        let until = self.last_commit_at(api).await?;
        let since = until - Duration::days(TRAILING_WINDOW_DAYS);
        let issues = api.list_issues(&self.repo.full_name, state).await?;
        Ok(issues
            .iter()
            .filter(|issue| within(issue.created_at, since, until))
            .count() as u64)
    }

    pub async fn releases_count(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        let until = self.last_commit_at(api).await?;
        let since = until - Duration::days(TRAILING_WINDOW_DAYS);
        let releases = api.list_releases(&self.repo.full_name).await?;
        Ok(releases
            .iter()
            .filter(|release| within(release.created_at, since, until))
            .count() as u64)
    }

    pub async fn branches_count(&mut self, api: &ApiClient) -> Result<u64, ProviderError> {
        Ok(api.list_branches(&self.repo.full_name).await?.len() as u64)
    }
}

fn within(at: DateTime<Utc>, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    at > since && at <= until
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::build_api_client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_repo(full_name: &str) -> Repository {
        serde_json::from_value(json!({
            "id": 1,
            "name": full_name.split('/').last().unwrap(),
            "full_name": full_name,
            "description": null,
            "created_at": "2015-03-01T00:00:00Z",
            "archived": false,
            "size": 10,
            "stargazers_count": 0,
            "watchers_count": 0,
            "forks_count": 0,
            "owner": { "login": "o", "type": "User" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_directory_names_count_for_file_presence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/contents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "tests", "path": "tests", "type": "dir" },
                { "name": "main.rs", "path": "main.rs", "type": "file" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/contents/tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "runner.rs", "path": "tests/runner.rs", "type": "file" }
            ])))
            .mount(&server)
            .await;

        let api = ApiClient::new(
            build_api_client().unwrap(),
            &server.uri(),
            "token-a".to_string(),
        )
        .unwrap();
        let mut view = RepoView::new(test_repo("o/r"));

        // A tests/ directory satisfies the presence check even though no
        // file is literally named "tests".
        assert!(view
            .has_file_named(&api, &["test", "tests", "t", "spec"])
            .await
            .unwrap());
        assert!(!view.has_file_named(&api, &["example", "examples"]).await.unwrap());

        // The file listing stays directories-free for the migration
        // heuristic.
        assert_eq!(
            view.files(&api).await.unwrap(),
            &["main.rs".to_string(), "tests/runner.rs".to_string()]
        );
        assert_eq!(view.dirs(&api).await.unwrap(), &["tests".to_string()]);
    }

    #[test]
    fn test_vendor_paths_are_filtered() {
        assert!(is_vendor_path("vendor"));
        assert!(is_vendor_path("src/vendor"));
        assert!(is_vendor_path("node_modules"));
        assert!(is_vendor_path("third_party"));
        assert!(is_vendor_path(".github"));
        assert!(!is_vendor_path("src"));
        assert!(!is_vendor_path("distributed"));
    }

    #[test]
    fn test_within_is_half_open() {
        let until = Utc::now();
        let since = until - Duration::days(10);
        assert!(within(until, since, until));
        assert!(!within(since, since, until));
        assert!(within(until - Duration::days(5), since, until));
        assert!(!within(until + Duration::seconds(1), since, until));
    }
}
