//! Orchestration of local checkpoint files and their remote mirrors
//!
//! A [`Checkpointer`] knows how to push a group of local files to the blob
//! store (timestamped, pruned) and how to pull the newest generation back
//! down at the start of a run. With the blob store disabled it degrades to
//! local files only.

use crate::checkpoint::blob::{append_timestamp, extract_timestamp, BlobStore, S3BlobStore};
use crate::config::BlobConfig;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

pub struct Checkpointer {
    blob: Option<Arc<dyn BlobStore>>,
    prefix: String,
}

impl Checkpointer {
    /// A checkpointer that keeps checkpoints on the local filesystem only
    pub fn local_only() -> Self {
        Self {
            blob: None,
            prefix: String::new(),
        }
    }

    pub fn with_store(blob: Arc<dyn BlobStore>, prefix: String) -> Self {
        Self {
            blob: Some(blob),
            prefix,
        }
    }

    /// Builds a checkpointer from configuration, connecting to S3 if enabled
    pub async fn connect(config: &BlobConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::local_only());
        }
        let store = S3BlobStore::connect(config).await?;
        Ok(Self::with_store(Arc::new(store), config.prefix.clone()))
    }

    /// Downloads the newest remote generation of each file, if present
    ///
    /// A missing bucket or missing object is a fresh start, not an error.
    pub async fn download_all(&self, files: &[&Path]) -> Result<()> {
        let Some(blob) = &self.blob else {
            return Ok(());
        };

        if !blob.bucket_exists().await? {
            tracing::info!("Checkpoint bucket does not exist");
            return Ok(());
        }

        for file in files {
            let base = self.object_base(file);
            match self.newest_key(blob.as_ref(), &base).await? {
                Some(key) => blob.download(&key, file).await?,
                None => tracing::debug!("No remote checkpoint found for {}", base),
            }
        }
        tracing::info!("Checkpoint files downloaded from blob store");
        Ok(())
    }

    /// Uploads each existing local file under a fresh timestamped key and
    /// prunes the oldest surplus generation
    pub async fn upload_all(&self, files: &[&Path]) -> Result<()> {
        let Some(blob) = &self.blob else {
            return Ok(());
        };

        if !blob.bucket_exists().await? {
            blob.create_bucket().await?;
            tracing::info!("Created checkpoint bucket");
        }

        for file in files {
            if !file.exists() {
                tracing::debug!("Skipping upload of missing file {}", file.display());
                continue;
            }
            let base = self.object_base(file);
            blob.upload(file, &append_timestamp(&base)).await?;
            self.prune(&base).await?;
        }
        tracing::info!("Checkpoint files uploaded to blob store");
        Ok(())
    }

    /// Deletes the oldest stored generation sharing an object-name prefix
    ///
    /// Never deletes the sole remaining object for the prefix.
    pub async fn prune(&self, base: &str) -> Result<()> {
        let Some(blob) = &self.blob else {
            return Ok(());
        };

        let mut generations: Vec<_> = blob
            .list(base)
            .await?
            .into_iter()
            .filter_map(|key| extract_timestamp(&key).map(|ts| (key, ts)))
            .collect();

        if generations.len() > 1 {
            generations.sort_by_key(|(_, ts)| *ts);
            let (oldest, _) = &generations[0];
            blob.delete(oldest).await?;
        }
        Ok(())
    }

    async fn newest_key(&self, blob: &dyn BlobStore, base: &str) -> Result<Option<String>> {
        let newest = blob
            .list(base)
            .await?
            .into_iter()
            .filter_map(|key| extract_timestamp(&key).map(|ts| (key, ts)))
            .max_by_key(|(_, ts)| *ts)
            .map(|(key, _)| key);
        Ok(newest)
    }

    /// Object-name base for a local file: configured prefix + file name
    fn object_base(&self, file: &Path) -> String {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}{}", self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::blob::MemoryBlobStore;
    use tempfile::tempdir;

    async fn seeded_store(keys: &[(&str, &[u8])]) -> Arc<MemoryBlobStore> {
        let store = Arc::new(MemoryBlobStore::new());
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        store.create_bucket().await.unwrap();
        for (key, body) in keys {
            std::fs::write(&scratch, body).unwrap();
            store.upload(&scratch, key).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("maintained_ids.dat");
        std::fs::write(&file, b"[1,2]").unwrap();

        let store = Arc::new(MemoryBlobStore::new());
        let checkpointer = Checkpointer::with_store(store.clone(), "run/".to_string());

        checkpointer.upload_all(&[&file]).await.unwrap();

        // Remove the local copy and pull it back down.
        std::fs::remove_file(&file).unwrap();
        checkpointer.download_all(&[&file]).await.unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"[1,2]");
    }

    #[tokio::test]
    async fn test_prune_deletes_only_oldest() {
        let store = seeded_store(&[
            ("ids.dat_2023-01-01-00:00:00", b"old"),
            ("ids.dat_2023-02-01-00:00:00", b"mid"),
            ("ids.dat_2023-03-01-00:00:00", b"new"),
        ])
        .await;
        let checkpointer = Checkpointer::with_store(store.clone(), String::new());

        checkpointer.prune("ids.dat").await.unwrap();

        let remaining = store.list("ids.dat").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&"ids.dat_2023-01-01-00:00:00".to_string()));
    }

    #[tokio::test]
    async fn test_prune_retains_sole_object() {
        let store = seeded_store(&[("ids.dat_2023-01-01-00:00:00", b"only")]).await;
        let checkpointer = Checkpointer::with_store(store.clone(), String::new());

        checkpointer.prune("ids.dat").await.unwrap();

        assert_eq!(store.list("ids.dat").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_download_picks_newest_generation() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ids.dat");

        let store = seeded_store(&[
            ("ids.dat_2023-01-01-00:00:00", b"old"),
            ("ids.dat_2023-03-01-00:00:00", b"new"),
        ])
        .await;
        let checkpointer = Checkpointer::with_store(store, String::new());

        checkpointer.download_all(&[&file]).await.unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_bucket_is_a_fresh_start() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ids.dat");

        let store = Arc::new(MemoryBlobStore::new());
        let checkpointer = Checkpointer::with_store(store, String::new());

        checkpointer.download_all(&[&file]).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_local_only_is_a_no_op() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ids.dat");

        let checkpointer = Checkpointer::local_only();
        checkpointer.upload_all(&[&file]).await.unwrap();
        checkpointer.download_all(&[&file]).await.unwrap();
    }
}
