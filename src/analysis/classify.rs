//! The two ordered classification predicates
//!
//! A candidate is first checked for suitability (is this a real, fully
//! migrated software project?) and only then for maintenance status. Both
//! predicates read metadata through a [`RepoView`] and surface remote
//! failures unchanged so the crawl loop can decide between rotation,
//! retry, and skipping.

use crate::analysis::view::RepoView;
use crate::provider::models::Languages;
use crate::provider::{ApiClient, ProviderError};

/// Minimum active development span for a suitable repository
const MIN_DEVELOPMENT_DAYS: i64 = 730;

/// Repositories with fewer commits than this cannot be judged for history
/// migration and are unsuitable outright
const MIN_COMMITS: usize = 20;

/// How many of the earliest commits the migration heuristic inspects
const EARLIEST_COMMITS_SCANNED: usize = 20;

/// Minimum contributor count for a maintained repository
const MIN_CONTRIBUTORS: u64 = 3;

/// Trailing window without a commit after which a repository counts as
/// inactive
const INACTIVE_DAYS: i64 = 365;

/// Name fragment that disqualifies a repository from being "maintained"
const DISQUALIFYING_NAME_FRAGMENT: &str = "dotfile";

/// Phrases in a readme that announce ceased maintenance
const CESSATION_KEYWORDS: &[&str] = &[
    "deprecated",
    "unmaintained",
    "no longer maintained",
    "no longer supported",
    "no longer under development",
    "not maintained",
    "not under development",
    "obsolete",
    "archived",
];

/// Languages counted as programming languages, lowercased
///
/// Condensed from the linguist taxonomy: markup, data, and prose languages
/// are deliberately absent.
const PROGRAMMING_LANGUAGES: &[&str] = &[
    "ada", "assembly", "c", "c#", "c++", "clojure", "cobol", "coffeescript", "common lisp",
    "crystal", "d", "dart", "elixir", "elm", "erlang", "f#", "fortran", "go", "groovy", "haskell",
    "java", "javascript", "julia", "kotlin", "lua", "matlab", "nim", "objective-c", "ocaml",
    "pascal", "perl", "php", "powershell", "prolog", "python", "r", "racket", "ruby", "rust",
    "scala", "scheme", "shell", "smalltalk", "swift", "typescript", "vala", "verilog", "vhdl",
    "visual basic", "zig",
];

/// Suitability predicate
///
/// A repository is unsuitable when its development span is too short, none
/// of its languages is a programming language, or the visible history looks
/// like an incomplete migration.
pub async fn suitable(view: &mut RepoView, api: &ApiClient) -> Result<bool, ProviderError> {
    if view.development_days(api).await? < MIN_DEVELOPMENT_DAYS {
        return Ok(false);
    }
    if !in_programming_language(view.languages(api).await?) {
        return Ok(false);
    }
    if incorrectly_migrated(view, api).await? {
        return Ok(false);
    }
    Ok(true)
}

/// Maintenance predicate; call only on suitable repositories
pub async fn unmaintained(view: &mut RepoView, api: &ApiClient) -> Result<bool, ProviderError> {
    if view
        .full_name()
        .to_lowercase()
        .contains(DISQUALIFYING_NAME_FRAGMENT)
    {
        return Ok(true);
    }
    // The description is already in hand; check it before anything that
    // costs a remote call.
    if let Some(description) = &view.repo().description {
        if contains_cessation_keyword(description) {
            return Ok(true);
        }
    }
    if view.contributors_count(api).await? < MIN_CONTRIBUTORS {
        return Ok(true);
    }
    if view.repo().archived {
        return Ok(true);
    }
    if let Some(readme) = view.readme_text(api).await? {
        if contains_cessation_keyword(&readme) {
            return Ok(true);
        }
    }
    if !view.commit_within_days(api, INACTIVE_DAYS).await? {
        return Ok(true);
    }
    Ok(false)
}

/// Whether any of the repository's languages is a programming language
pub fn in_programming_language(languages: &Languages) -> bool {
    languages
        .keys()
        .any(|language| PROGRAMMING_LANGUAGES.contains(&language.to_lowercase().as_str()))
}

/// Whether a readme announces ceased maintenance
pub fn contains_cessation_keyword(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CESSATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Incomplete-history-migration heuristic
///
/// When the visible history is the true origin history, the files present
/// in the working tree appear as "added" somewhere in the earliest commits.
/// If more than half of the tree never does, the repository was imported
/// with its history cut off.
async fn incorrectly_migrated(
    view: &mut RepoView,
    api: &ApiClient,
) -> Result<bool, ProviderError> {
    let commits = view.commits(api).await?;
    if commits.len() < MIN_COMMITS {
        return Ok(true);
    }
    // Earliest commits sit at the tail of the newest-first listing.
    let earliest: Vec<String> = commits
        .iter()
        .rev()
        .take(EARLIEST_COMMITS_SCANNED)
        .map(|commit| commit.sha.clone())
        .collect();

    let full_name = view.full_name().to_string();
    let mut unexplained: Vec<String> = view.files(api).await?.to_vec();
    let original_size = unexplained.len();
    if original_size == 0 {
        return Ok(false);
    }

    for sha in earliest {
        let detail = api.get_commit(&full_name, &sha).await?;
        for file in detail.files {
            if file.status == "added" {
                unexplained.retain(|path| *path != file.filename);
            }
        }
    }

    Ok(unexplained.len() * 2 > original_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{build_api_client, Repository};
    use serde_json::json;

    fn repo_with_description(description: Option<&str>) -> Repository {
        serde_json::from_value(json!({
            "id": 5,
            "name": "widget",
            "full_name": "octo/widget",
            "description": description,
            "created_at": "2015-03-01T00:00:00Z",
            "archived": false,
            "size": 10,
            "stargazers_count": 0,
            "watchers_count": 0,
            "forks_count": 0,
            "owner": { "login": "octo", "type": "User" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_cessation_keyword_in_description_marks_unmaintained() {
        // The description check fires before any remote call, so an
        // unreachable base URL proves no request was needed.
        let api = ApiClient::new(
            build_api_client().unwrap(),
            "http://127.0.0.1:9",
            "token-a".to_string(),
        )
        .unwrap();
        let mut view = RepoView::new(repo_with_description(Some(
            "DEPRECATED - superseded by octo/widget2",
        )));

        assert!(unmaintained(&mut view, &api).await.unwrap());
    }

    #[test]
    fn test_programming_language_detection() {
        let mut languages = Languages::new();
        languages.insert("HTML".to_string(), 5000);
        assert!(!in_programming_language(&languages));

        languages.insert("Rust".to_string(), 100);
        assert!(in_programming_language(&languages));
    }

    #[test]
    fn test_language_check_is_case_insensitive() {
        let mut languages = Languages::new();
        languages.insert("PYTHON".to_string(), 10);
        assert!(in_programming_language(&languages));
    }

    #[test]
    fn test_cessation_keywords() {
        assert!(contains_cessation_keyword(
            "This project is **no longer maintained**, use foo instead."
        ));
        assert!(contains_cessation_keyword("DEPRECATED in favour of bar"));
        assert!(!contains_cessation_keyword(
            "A well maintained parser for widget files."
        ));
    }
}
