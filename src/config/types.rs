use serde::Deserialize;
use std::fmt;

/// Main configuration structure for Quarry
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub compute: ComputeConfig,
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    pub provider: ProviderConfig,
}

/// Crawl-phase configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Repositories created before this year are not considered
    pub from_year: i32,

    /// Repositories created after this year are not considered
    pub to_year: i32,

    /// Search query template; `{date}` is replaced with a random sample date
    pub query: String,

    /// Classification set whose size ends the run
    pub target_set: TargetSet,

    /// Run stops once the target set reaches this many entries
    pub target_count: usize,

    /// How many candidate ids to take from one search batch
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

/// Feature-computation-phase configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComputeConfig {
    /// Ordered feature names; resolved against the registry at startup
    pub features: Vec<String>,

    /// Output table for repositories drawn from the maintained set
    pub maintained_csv: String,

    /// Output table for repositories drawn from the unmaintained set
    pub unmaintained_csv: String,
}

/// Checkpoint file paths and flush policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointConfig {
    /// Path to the unmaintained id-set checkpoint file
    pub unmaintained_ids: String,

    /// Path to the maintained id-set checkpoint file
    pub maintained_ids: String,

    /// Path to the not-suitable id-set checkpoint file
    pub not_suitable_ids: String,

    /// Path to the cross-run name-deduplication checkpoint file
    pub seen_names: String,

    /// Run-log file; uploaded with the sets on every flush
    #[serde(default = "default_run_log")]
    pub run_log: String,

    /// Flush and upload every this many classified/computed entities
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,
}

/// Durable blob store (S3-compatible) configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlobConfig {
    /// When false, checkpoints stay on the local filesystem only
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub bucket: String,

    /// Object-name prefix shared by all uploads of this deployment
    #[serde(default)]
    pub prefix: String,

    /// Custom endpoint for S3-compatible stores; None means AWS
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Remote provider and identity pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfig {
    /// Base URL of the repository platform's REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable names holding one API token each
    pub token_env: Vec<String>,

    /// Longest single quota wait the identity pool will perform
    #[serde(default = "default_max_wait_minutes")]
    pub max_wait_minutes: u64,

    /// Identity acquisition attempts before giving up for good
    #[serde(default = "default_acquire_attempts")]
    pub acquire_attempts: u32,

    /// Resolved token values; filled from the environment at load time
    #[serde(skip)]
    pub tokens: Vec<String>,
}

/// The three classification sets a run can target
///
/// A closed enumeration instead of a string key: the stopping condition and
/// the compute source are always one of exactly these three sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSet {
    Unmaintained,
    Maintained,
    NotSuitable,
}

impl TargetSet {
    /// Checkpoint file path for this set
    pub fn ids_file<'a>(&self, checkpoint: &'a CheckpointConfig) -> &'a str {
        match self {
            TargetSet::Unmaintained => &checkpoint.unmaintained_ids,
            TargetSet::Maintained => &checkpoint.maintained_ids,
            TargetSet::NotSuitable => &checkpoint.not_suitable_ids,
        }
    }
}

impl fmt::Display for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetSet::Unmaintained => "unmaintained",
            TargetSet::Maintained => "maintained",
            TargetSet::NotSuitable => "not-suitable",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for TargetSet {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmaintained" => Ok(TargetSet::Unmaintained),
            "maintained" => Ok(TargetSet::Maintained),
            "not-suitable" | "not_suitable" => Ok(TargetSet::NotSuitable),
            other => Err(crate::ConfigError::UnknownSet(other.to_string())),
        }
    }
}

fn default_sample_size() -> usize {
    100
}

fn default_flush_interval() -> usize {
    10
}

fn default_run_log() -> String {
    "quarry.log".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_max_wait_minutes() -> u64 {
    50
}

fn default_acquire_attempts() -> u32 {
    3
}
