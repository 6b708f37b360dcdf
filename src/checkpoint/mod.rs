//! Durable, resumable persistence of id sets and output tables
//!
//! Checkpoints have two layers: local set files written on every flush
//! (`sets`), and a remote blob store that mirrors those files with
//! timestamped object names (`blob`). The [`store::Checkpointer`] ties the
//! two together for the crawl and compute loops.

pub mod blob;
pub mod sets;
pub mod store;

use thiserror::Error;

pub use blob::{BlobStore, MemoryBlobStore, S3BlobStore};
pub use sets::{load_ids, load_names, save_ids, save_names};
pub use store::Checkpointer;

/// Errors from the local checkpoint layer
///
/// Only writes can fail; reads of missing or corrupt files deliberately
/// produce an empty set instead of an error.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize checkpoint {path}: {source}")]
    Serialize {
        path: String,
        source: serde_json::Error,
    },
}
