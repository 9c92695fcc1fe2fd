//! Filesystem-backed durable cache
//!
//! Stores one JSON blob per cache key under a configured directory. Every
//! write is a full overwrite through a temp file + rename, so readers never
//! observe a partial record. A corrupt or unreadable blob reads as absent
//! rather than failing the request; the orchestrator then treats the cache
//! as empty, which matches the write-through contract (the next successful
//! fetch rewrites the blob).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::core::DurableCache;
use crate::types::{CacheRecord, ChartError};

/// Durable cache rooted at a directory, one `<key>.json` blob per key
#[derive(Debug, Clone)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    /// Create a cache rooted at the given directory
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsCache { root: root.into() }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl DurableCache for FsCache {
    async fn read(&self, key: &str) -> Result<Option<CacheRecord>, ChartError> {
        let path = self.blob_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ChartError::cache_read_failed(key, err.to_string())),
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // Corrupt blob: treat as absent, the next write-through
                // replaces it
                warn!(path = %path.display(), error = %err, "ignoring corrupt cache blob");
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &str, record: &CacheRecord) -> Result<(), ChartError> {
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ChartError::cache_write_failed(key, e.to_string()))?;
        }

        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| ChartError::cache_write_failed(key, e.to_string()))?;

        // Write to a version-named temp file, then rename over the blob so
        // concurrent readers see either the old or the new record
        let tmp = self.root.join(format!("{key}.{}.tmp", record.version));
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ChartError::cache_write_failed(key, e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| ChartError::cache_write_failed(key, e.to_string()))?;

        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<(), ChartError> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ChartError::cache_write_failed(key, err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountRecord;
    use tempfile::TempDir;

    fn sample_record() -> CacheRecord {
        CacheRecord::new(vec![AccountRecord::new(
            "990300",
            "Platform Infrastructure",
            true,
        )])
    }

    #[tokio::test]
    async fn test_read_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());

        assert_eq!(cache.read("chart-of-accounts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrips() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());
        let record = sample_record();

        cache.write("chart-of-accounts", &record).await.unwrap();
        let read = cache.read("chart-of-accounts").await.unwrap();
        assert_eq!(read, Some(record));
    }

    #[tokio::test]
    async fn test_write_is_full_overwrite() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());

        let first = sample_record();
        let second = CacheRecord::new(vec![AccountRecord::new("111111", "Replacement", true)]);

        cache.write("chart-of-accounts", &first).await.unwrap();
        cache.write("chart-of-accounts", &second).await.unwrap();

        let read = cache.read("chart-of-accounts").await.unwrap().unwrap();
        assert_eq!(read, second);
    }

    #[tokio::test]
    async fn test_corrupt_blob_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());

        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("chart-of-accounts.json"), b"not json")
            .await
            .unwrap();

        assert_eq!(cache.read("chart-of-accounts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_removes_blob() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());

        cache.write("chart-of-accounts", &sample_record()).await.unwrap();
        cache.purge("chart-of-accounts").await.unwrap();

        assert_eq!(cache.read("chart-of-accounts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_missing_key_is_ok() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path());

        assert!(cache.purge("chart-of-accounts").await.is_ok());
    }
}
