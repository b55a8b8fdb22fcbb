//! On-disk cache provider.
//!
//! Each entry is one file under the cache directory, named by the SHA-256 of
//! its key. Writes go to a temp file first and are renamed into place, so a
//! crashed write never leaves a truncated entry behind. Every write gets its
//! own temp file; the rename and the size accounting happen under one lock
//! so concurrent writers of the same key count the entry once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::traits::{BoxFuture, Cache, CacheError};
use crate::fingerprint::sha256_hex;

const ENTRY_EXTENSION: &str = "bin";

/// On-disk cache provider.
pub struct DiskCacheProvider {
    directory: PathBuf,
    size_bytes: AtomicU64,
    entry_count: AtomicU64,
    next_temp: AtomicU64,
    commit: Mutex<()>,
}

impl DiskCacheProvider {
    /// Open (creating if needed) a cache directory.
    ///
    /// Existing entries are counted so `size_bytes` and `entry_count` are
    /// correct across restarts.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;

        let (mut size, mut count) = (0u64, 0u64);
        let mut dir = tokio::fs::read_dir(&directory).await?;
        while let Some(entry) = dir.next_entry().await? {
            if is_entry_file(&entry.path()) {
                size += entry.metadata().await?.len();
                count += 1;
            }
        }

        debug!(
            directory = %directory.display(),
            entries = count,
            size_bytes = size,
            "Opened disk cache"
        );

        Ok(Self {
            directory,
            size_bytes: AtomicU64::new(size),
            entry_count: AtomicU64::new(count),
            next_temp: AtomicU64::new(0),
            commit: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", sha256_hex(key.as_bytes()), ENTRY_EXTENSION))
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("{}.tmp", n))
    }

    async fn existing_len(path: &Path) -> Option<u64> {
        tokio::fs::metadata(path).await.ok().map(|m| m.len())
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
}

impl Cache for DiskCacheProvider {
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            let temp_path = self.temp_path(&path);
            tokio::fs::write(&temp_path, &value).await?;

            let _commit = self.commit.lock().await;
            let previous = Self::existing_len(&path).await;
            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }

            match previous {
                Some(old) => {
                    self.size_bytes.fetch_sub(old, Ordering::Relaxed);
                }
                None => {
                    self.entry_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.size_bytes
                .fetch_add(value.len() as u64, Ordering::Relaxed);
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            let _commit = self.commit.lock().await;
            let Some(len) = Self::existing_len(&path).await else {
                return Ok(false);
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    self.size_bytes.fetch_sub(len, Ordering::Relaxed);
                    self.entry_count.fetch_sub(1, Ordering::Relaxed);
                    Ok(true)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move { Ok(tokio::fs::try_exists(&path).await?) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let _commit = self.commit.lock().await;
            let mut dir = tokio::fs::read_dir(&self.directory).await?;
            while let Some(entry) = dir.next_entry().await? {
                let path = entry.path();
                if is_entry_file(&path) {
                    tokio::fs::remove_file(&path).await?;
                }
            }
            self.size_bytes.store(0, Ordering::Relaxed);
            self.entry_count.store(0, Ordering::Relaxed);
            Ok(())
        })
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_provider_set_and_get() {
        let temp = TempDir::new().unwrap();
        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();

        provider.set("pak-index:abc", vec![1, 2, 3]).await.unwrap();

        assert_eq!(
            provider.get("pak-index:abc").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert!(provider.get("pak-index:missing").await.unwrap().is_none());
        assert_eq!(provider.entry_count(), 1);
        assert_eq!(provider.size_bytes(), 3);
    }

    #[tokio::test]
    async fn test_disk_provider_keys_with_path_separators() {
        let temp = TempDir::new().unwrap();
        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();

        provider
            .set("asset:ff00:models/items/armor/tris.md2", vec![9])
            .await
            .unwrap();

        assert!(provider
            .contains("asset:ff00:models/items/armor/tris.md2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_disk_provider_replace_updates_size() {
        let temp = TempDir::new().unwrap();
        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();

        provider.set("k", vec![0u8; 100]).await.unwrap();
        provider.set("k", vec![0u8; 40]).await.unwrap();

        assert_eq!(provider.entry_count(), 1);
        assert_eq!(provider.size_bytes(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disk_provider_concurrent_writes_same_key() {
        let temp = TempDir::new().unwrap();
        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();

        let writes = (0..8).map(|_| provider.set("asset:ff00:pics/colormap.pcx", vec![5u8; 32]));
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(provider.entry_count(), 1);
        assert_eq!(provider.size_bytes(), 32);
        let leftovers = std::fs::read_dir(temp.path())
            .unwrap()
            .filter(|e| !is_entry_file(&e.as_ref().unwrap().path()))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_disk_provider_delete_and_clear() {
        let temp = TempDir::new().unwrap();
        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();

        provider.set("a", vec![1]).await.unwrap();
        provider.set("b", vec![2, 2]).await.unwrap();

        assert!(provider.delete("a").await.unwrap());
        assert!(!provider.delete("a").await.unwrap());
        assert_eq!(provider.entry_count(), 1);

        provider.clear().await.unwrap();
        assert_eq!(provider.entry_count(), 0);
        assert_eq!(provider.size_bytes(), 0);
        assert!(provider.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_provider_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let provider = DiskCacheProvider::open(temp.path()).await.unwrap();
            provider.set("persisted", vec![7u8; 16]).await.unwrap();
        }

        let provider = DiskCacheProvider::open(temp.path()).await.unwrap();
        assert_eq!(provider.entry_count(), 1);
        assert_eq!(provider.size_bytes(), 16);
        assert_eq!(
            provider.get("persisted").await.unwrap(),
            Some(vec![7u8; 16])
        );
    }
}
