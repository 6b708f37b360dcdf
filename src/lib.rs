//! Quarry: a rate-limited, checkpointed repository dataset miner
//!
//! This crate crawls a GitHub-shaped repository platform through a
//! quota-limited API, classifies repositories as maintained, unmaintained,
//! or not suitable, and computes per-repository feature vectors into a CSV
//! table. Both phases checkpoint their progress so a crash or forced
//! termination loses at most a bounded window of recent work.

pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod features;
pub mod identity;
pub mod output;
pub mod provider;

use thiserror::Error;

/// Main error type for Quarry operations
#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("No API quota granted after {attempts} acquisition attempts")]
    QuotaUnavailable { attempts: u32 },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Output table error for {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown feature name: {0}")]
    UnknownFeature(String),

    #[error("Unknown classification set: {0}")]
    UnknownSet(String),

    #[error("Token environment variable not set: {0}")]
    MissingToken(String),
}

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, TargetSet};
pub use features::{Feature, FeatureValue};
pub use identity::{Identity, IdentityPool};
pub use provider::{ApiClient, ProviderError};
