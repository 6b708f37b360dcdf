//! Remote blob store behind a trait
//!
//! Uploaded objects get a timestamp suffix so "oldest" is well defined and
//! pruning can retain exactly the newest generations. The S3 implementation
//! talks to AWS or any S3-compatible endpoint; the in-memory implementation
//! backs tests and local dry runs.

use crate::config::BlobConfig;
use crate::{QuarryError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use chrono::{NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Timestamp suffix format appended to every uploaded object name
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Durable object store for checkpoint and result files
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether the configured bucket exists
    async fn bucket_exists(&self) -> Result<bool>;

    /// Creates the configured bucket
    async fn create_bucket(&self) -> Result<()>;

    /// Uploads a local file under the given object key
    async fn upload(&self, local: &Path, key: &str) -> Result<()>;

    /// Downloads an object into a local file
    async fn download(&self, key: &str, local: &Path) -> Result<()>;

    /// Lists object keys sharing a prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Deletes one object by key
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Appends the current-time suffix to an object name
pub fn append_timestamp(name: &str) -> String {
    format!("{}_{}", name, Utc::now().format(TIMESTAMP_FORMAT))
}

/// Extracts the timestamp suffix from an object key, if well formed
pub fn extract_timestamp(key: &str) -> Option<NaiveDateTime> {
    let suffix = &key[key.rfind('_')? + 1..];
    NaiveDateTime::parse_from_str(suffix, TIMESTAMP_FORMAT).ok()
}

/// S3-backed blob store
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3BlobStore {
    /// Connects using the configured region and optional custom endpoint
    pub async fn connect(config: &BlobConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn bucket_exists(&self) -> Result<bool> {
        match self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!("Bucket check failed, treating as absent: {}", e);
                Ok(false)
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let constraint = BucketLocationConstraint::from(self.region.as_str());
        let location = CreateBucketConfiguration::builder()
            .location_constraint(constraint)
            .build();
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .create_bucket_configuration(location)
            .send()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        Ok(())
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        tracing::debug!("File uploaded: {}", key);
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?
            .into_bytes();
        tokio::fs::write(local, bytes).await?;
        tracing::debug!("File downloaded: {}", key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| QuarryError::Blob(e.to_string()))?;
        tracing::debug!("File deleted: {}", key);
        Ok(())
    }
}

/// In-memory blob store used by tests and offline runs
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    bucket_created: Mutex<bool>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a stored object, for assertions
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn bucket_exists(&self) -> Result<bool> {
        Ok(*self.bucket_created.lock().unwrap())
    }

    async fn create_bucket(&self) -> Result<()> {
        *self.bucket_created.lock().unwrap() = true;
        Ok(())
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let body = std::fs::read(local)?;
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<()> {
        let body = self
            .object(key)
            .ok_or_else(|| QuarryError::Blob(format!("no such object: {}", key)))?;
        std::fs::write(local, body)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let key = append_timestamp("maintained_ids.dat");
        assert!(key.starts_with("maintained_ids.dat_"));
        assert!(extract_timestamp(&key).is_some());
    }

    #[test]
    fn test_extract_timestamp_orders_generations() {
        let older = "ids.dat_2023-01-01-10:00:00";
        let newer = "ids.dat_2023-06-15-08:30:00";
        assert!(extract_timestamp(older).unwrap() < extract_timestamp(newer).unwrap());
    }

    #[test]
    fn test_extract_timestamp_rejects_malformed_keys() {
        assert!(extract_timestamp("no-suffix-here").is_none());
        assert!(extract_timestamp("ids.dat_notadate").is_none());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.dat");
        let target = dir.path().join("out.dat");
        std::fs::write(&source, b"[1,2,3]").unwrap();

        let store = MemoryBlobStore::new();
        store.create_bucket().await.unwrap();
        store.upload(&source, "pfx/in.dat_2023-01-01-00:00:00").await.unwrap();

        assert_eq!(store.list("pfx/").await.unwrap().len(), 1);

        store
            .download("pfx/in.dat_2023-01-01-00:00:00", &target)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"[1,2,3]");
    }
}
