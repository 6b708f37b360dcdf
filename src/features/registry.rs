use crate::analysis::RepoView;
use crate::output::SENTINEL;
use crate::provider::{ApiClient, ProviderError};
use crate::ConfigError;
use std::fmt;

/// One computed cell of a feature row
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The feature could not be computed within the retry budget
    Missing,
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(value) => write!(f, "{}", value),
            FeatureValue::Float(value) => write!(f, "{}", value),
            FeatureValue::Bool(value) => write!(f, "{}", value),
            FeatureValue::Missing => write!(f, "{}", SENTINEL),
        }
    }
}

/// The closed set of computable repository features
///
/// Every variant reads entity metadata through a [`RepoView`]; none keeps
/// state of its own, so features are independent and can be sentineled
/// individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    StargazersCount,
    ForksCount,
    WatchersCount,
    Size,
    CommitsCount,
    BranchesCount,
    ReleasesCount,
    PullsCountOpen,
    PullsCountClosed,
    IssuesCountOpen,
    IssuesCountClosed,
    LastCommitAge,
    DevelopmentTime,
    ContributorsCount,
    OwnerType,
    OwnerAccountAge,
    OwnerFollowers,
    OwnerFollowing,
    OwnerProjectsCount,
    AvgDevAccountAge,
    DevsFollowersAvg,
    DevsFollowingAvg,
    CommitsByTopDev,
    CodeLength,
    HasReadme,
    HasTest,
    HasDoc,
    HasExample,
    Archived,
}

impl Feature {
    /// All features, in no particular order; the configured list decides
    /// column order
    pub const ALL: &'static [Feature] = &[
        Feature::StargazersCount,
        Feature::ForksCount,
        Feature::WatchersCount,
        Feature::Size,
        Feature::CommitsCount,
        Feature::BranchesCount,
        Feature::ReleasesCount,
        Feature::PullsCountOpen,
        Feature::PullsCountClosed,
        Feature::IssuesCountOpen,
        Feature::IssuesCountClosed,
        Feature::LastCommitAge,
        Feature::DevelopmentTime,
        Feature::ContributorsCount,
        Feature::OwnerType,
        Feature::OwnerAccountAge,
        Feature::OwnerFollowers,
        Feature::OwnerFollowing,
        Feature::OwnerProjectsCount,
        Feature::AvgDevAccountAge,
        Feature::DevsFollowersAvg,
        Feature::DevsFollowingAvg,
        Feature::CommitsByTopDev,
        Feature::CodeLength,
        Feature::HasReadme,
        Feature::HasTest,
        Feature::HasDoc,
        Feature::HasExample,
        Feature::Archived,
    ];

    /// The configured spelling of this feature
    pub fn name(&self) -> &'static str {
        match self {
            Feature::StargazersCount => "stargazers-count",
            Feature::ForksCount => "forks-count",
            Feature::WatchersCount => "watchers-count",
            Feature::Size => "size",
            Feature::CommitsCount => "commits-count",
            Feature::BranchesCount => "branches-count",
            Feature::ReleasesCount => "releases-count",
            Feature::PullsCountOpen => "pulls-count-open",
            Feature::PullsCountClosed => "pulls-count-closed",
            Feature::IssuesCountOpen => "issues-count-open",
            Feature::IssuesCountClosed => "issues-count-closed",
            Feature::LastCommitAge => "last-commit-age",
            Feature::DevelopmentTime => "development-time",
            Feature::ContributorsCount => "contributors-count",
            Feature::OwnerType => "owner-type",
            Feature::OwnerAccountAge => "owner-account-age",
            Feature::OwnerFollowers => "owner-followers",
            Feature::OwnerFollowing => "owner-following",
            Feature::OwnerProjectsCount => "owner-projects-count",
            Feature::AvgDevAccountAge => "avg-dev-account-age",
            Feature::DevsFollowersAvg => "devs-followers-avg",
            Feature::DevsFollowingAvg => "devs-following-avg",
            Feature::CommitsByTopDev => "commits-by-top-dev",
            Feature::CodeLength => "code-length",
            Feature::HasReadme => "has-readme",
            Feature::HasTest => "has-test",
            Feature::HasDoc => "has-doc",
            Feature::HasExample => "has-example",
            Feature::Archived => "archived",
        }
    }

    /// Resolves configured feature names into typed variants, in order
    ///
    /// An unknown name fails resolution; this runs during config
    /// validation so a typo ends the program before any remote call.
    pub fn resolve(names: &[String]) -> Result<Vec<Feature>, ConfigError> {
        names
            .iter()
            .map(|name| {
                Feature::ALL
                    .iter()
                    .copied()
                    .find(|feature| feature.name() == name)
                    .ok_or_else(|| ConfigError::UnknownFeature(name.clone()))
            })
            .collect()
    }

    /// Computes this feature's value for one repository
    pub async fn compute(
        &self,
        view: &mut RepoView,
        api: &ApiClient,
    ) -> Result<FeatureValue, ProviderError> {
        let value = match self {
            Feature::StargazersCount => FeatureValue::Int(view.repo().stargazers_count as i64),
            Feature::ForksCount => FeatureValue::Int(view.repo().forks_count as i64),
            Feature::WatchersCount => FeatureValue::Int(view.repo().watchers_count as i64),
            Feature::Size => FeatureValue::Int(view.repo().size as i64),
            Feature::CommitsCount => FeatureValue::Int(view.commits_count(api).await? as i64),
            Feature::BranchesCount => FeatureValue::Int(view.branches_count(api).await? as i64),
            Feature::ReleasesCount => FeatureValue::Int(view.releases_count(api).await? as i64),
            Feature::PullsCountOpen => {
                FeatureValue::Int(view.pulls_count(api, "open").await? as i64)
            }
            Feature::PullsCountClosed => {
                FeatureValue::Int(view.pulls_count(api, "closed").await? as i64)
            }
            Feature::IssuesCountOpen => {
                FeatureValue::Int(view.issues_count(api, "open").await? as i64)
            }
            Feature::IssuesCountClosed => {
                FeatureValue::Int(view.issues_count(api, "closed").await? as i64)
            }
            Feature::LastCommitAge => {
                FeatureValue::Int(view.last_commit_age_days(api).await?)
            }
            Feature::DevelopmentTime => FeatureValue::Int(view.development_days(api).await?),
            Feature::ContributorsCount => {
                FeatureValue::Int(view.contributors_count(api).await? as i64)
            }
            Feature::OwnerType => {
                // 0 = organization, 1 = user
                let kind = view.repo().owner.kind.clone();
                match kind.as_str() {
                    "Organization" => FeatureValue::Int(0),
                    "User" => FeatureValue::Int(1),
                    other => {
                        return Err(ProviderError::Incomplete(format!(
                            "unsupported account type: {}",
                            other
                        )))
                    }
                }
            }
            Feature::OwnerAccountAge => {
                FeatureValue::Int(view.owner_account_age_days(api).await?)
            }
            Feature::OwnerFollowers => {
                FeatureValue::Int(view.owner_user(api).await?.followers as i64)
            }
            Feature::OwnerFollowing => {
                FeatureValue::Int(view.owner_user(api).await?.following as i64)
            }
            Feature::OwnerProjectsCount => {
                FeatureValue::Int(view.owner_user(api).await?.public_repos as i64)
            }
            Feature::AvgDevAccountAge => {
                FeatureValue::Float(view.avg_dev_account_age(api).await?)
            }
            Feature::DevsFollowersAvg => {
                FeatureValue::Float(view.devs_followers_avg(api).await?)
            }
            Feature::DevsFollowingAvg => {
                FeatureValue::Float(view.devs_following_avg(api).await?)
            }
            Feature::CommitsByTopDev => {
                FeatureValue::Int(view.commits_by_top_dev(api).await? as i64)
            }
            Feature::CodeLength => FeatureValue::Int(view.code_length(api).await? as i64),
            Feature::HasReadme => {
                FeatureValue::Bool(view.readme_text(api).await?.is_some())
            }
            Feature::HasTest => FeatureValue::Bool(
                view.has_file_named(api, &["test", "tests", "t", "spec"]).await?,
            ),
            Feature::HasDoc => FeatureValue::Bool(
                view.has_file_named(api, &["doc", "docs", "document", "documents"])
                    .await?,
            ),
            Feature::HasExample => {
                FeatureValue::Bool(view.has_file_named(api, &["example", "examples"]).await?)
            }
            Feature::Archived => FeatureValue::Bool(view.repo().archived),
        };
        Ok(value)
    }
}
