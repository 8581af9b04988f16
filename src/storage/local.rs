//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary file first and is renamed into place,
//! so a crash mid-write leaves the previous version intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ArchiveEntry, CacheSnapshot};
use crate::storage::SyncCache;

const SNAPSHOT_KEY: &str = "snapshot.json";
const ARCHIVE_DIR: &str = "archives";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Archive key for a normalized archive id.
    fn archive_key(archive_id: &str) -> String {
        format!("{ARCHIVE_DIR}/{archive_id}.txt")
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub(crate) async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    pub(crate) async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub(crate) async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub(crate) async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(key)).await?)
    }
}

#[async_trait]
impl SyncCache for LocalStorage {
    async fn load_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        let snapshot = self.read_json::<CacheSnapshot>(SNAPSHOT_KEY).await?;
        if snapshot.is_none() {
            log::debug!("No {} found under {}", SNAPSHOT_KEY, self.root_dir.display());
        }
        Ok(snapshot)
    }

    async fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        self.write_json(SNAPSHOT_KEY, snapshot).await?;
        log::info!(
            "Snapshot: {} items written to {}",
            snapshot.items.len(),
            SNAPSHOT_KEY
        );
        Ok(())
    }

    async fn has_archive(&self, archive_id: &str) -> Result<bool> {
        self.exists(&Self::archive_key(archive_id)).await
    }

    async fn read_archive(&self, archive_id: &str) -> Result<Option<String>> {
        match self.read_bytes(&Self::archive_key(archive_id)).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::validation(format!("archive {archive_id}: {e}"))),
            None => Ok(None),
        }
    }

    async fn write_archive(&self, entry: &ArchiveEntry) -> Result<bool> {
        let key = Self::archive_key(&entry.id);
        if self.exists(&key).await? {
            return Ok(false);
        }
        self.write_bytes(&key, entry.text.as_bytes()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawItem;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!storage.path("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_replaced_wholesale() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = CacheSnapshot::new(
            Utc::now(),
            vec![
                RawItem::new("a", vec!["x".into()]),
                RawItem::new("b", vec!["y".into()]),
            ],
            vec!["a".to_string()],
            BTreeMap::new(),
        );
        storage.save_snapshot(&first).await.unwrap();

        let second = CacheSnapshot::new(
            Utc::now(),
            vec![RawItem::new("c", vec![])],
            vec![],
            BTreeMap::new(),
        );
        storage.save_snapshot(&second).await.unwrap();

        let loaded = storage.load_snapshot().await.unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_archive_entries_are_write_once() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let entry = ArchiveEntry {
            id: "arc1".to_string(),
            text: "first".to_string(),
        };
        assert!(!storage.has_archive("arc1").await.unwrap());
        assert!(storage.write_archive(&entry).await.unwrap());
        assert!(storage.has_archive("arc1").await.unwrap());

        let again = ArchiveEntry {
            id: "arc1".to_string(),
            text: "second".to_string(),
        };
        assert!(!storage.write_archive(&again).await.unwrap());
        assert_eq!(
            storage.read_archive("arc1").await.unwrap().as_deref(),
            Some("first")
        );
        assert!(storage.path("archives/arc1.txt").exists());
    }
}
