//! Configuration loading, parsing, and validation
//!
//! Configuration lives in a single TOML file with kebab-case keys. API
//! tokens are never stored in the file; the `[provider]` section names
//! environment variables and the loader resolves them at startup.

pub mod parser;
pub mod types;
pub mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    BlobConfig, CheckpointConfig, ComputeConfig, Config, ProviderConfig, SearchConfig, TargetSet,
};
pub use validation::validate;
