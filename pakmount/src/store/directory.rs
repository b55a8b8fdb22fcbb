//! Directory-backed blob store.
//!
//! Layout:
//!
//! ```text
//! <root>/manifest.json   [BlobInfo, ...]
//! <root>/<id>.pak        blob bytes
//! ```
//!
//! Blob files and the manifest are written via temp file + rename.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{BlobInfo, BlobStore, StoreError};
use crate::cache::BoxFuture;

const MANIFEST_FILE: &str = "manifest.json";

/// Blob store rooted at a directory.
pub struct DirectoryBlobStore {
    root: PathBuf,
    /// Serialises manifest read-modify-write cycles.
    manifest_lock: Mutex<()>,
}

impl DirectoryBlobStore {
    /// Open a store, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened blob store");
        Ok(Self {
            root,
            manifest_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.pak", id))
    }

    async fn load_manifest(&self) -> Result<Vec<BlobInfo>, StoreError> {
        match tokio::fs::read(self.root.join(MANIFEST_FILE)).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_manifest(&self, manifest: &[BlobInfo]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&self.root.join(MANIFEST_FILE), &data).await
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, data).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

impl BlobStore for DirectoryBlobStore {
    fn get_blob(
        &self,
        name: &str,
        size: u64,
    ) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        let name = name.to_string();
        Box::pin(async move {
            let manifest = self.load_manifest().await?;
            Ok(manifest
                .into_iter()
                .find(|b| b.name == name && b.size == size)
                .map(|b| b.id))
        })
    }

    fn put_blob(&self, bytes: Vec<u8>, name: &str) -> BoxFuture<'_, Result<String, StoreError>> {
        let info = BlobInfo::new(name, bytes.len() as u64);
        Box::pin(async move {
            let _guard = self.manifest_lock.lock().await;

            write_atomic(&self.blob_path(&info.id), &bytes).await?;

            let mut manifest = self.load_manifest().await?;
            manifest.retain(|b| b.id != info.id);
            let id = info.id.clone();
            info!(id = %id, name = %info.name, size = info.size, "Stored archive");
            manifest.push(info);
            self.save_manifest(&manifest).await?;
            Ok(id)
        })
    }

    fn read_blob(&self, id: &str) -> BoxFuture<'_, Result<Vec<u8>, StoreError>> {
        let id = id.to_string();
        Box::pin(async move {
            match tokio::fs::read(self.blob_path(&id)).await {
                Ok(data) => Ok(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StoreError::NotFound(id))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn list_blobs(&self) -> BoxFuture<'_, Result<Vec<BlobInfo>, StoreError>> {
        Box::pin(async move {
            let mut manifest = self.load_manifest().await?;
            manifest.sort_by(|a, b| a.updated_at_ms.cmp(&b.updated_at_ms).then(a.id.cmp(&b.id)));
            Ok(manifest)
        })
    }

    fn delete_blob(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let id = id.to_string();
        Box::pin(async move {
            let _guard = self.manifest_lock.lock().await;

            let mut manifest = self.load_manifest().await?;
            let before = manifest.len();
            manifest.retain(|b| b.id != id);
            if manifest.len() != before {
                self.save_manifest(&manifest).await?;
            }

            match tokio::fs::remove_file(self.blob_path(&id)).await {
                Ok(()) => {
                    info!(id = %id, "Deleted stored archive");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_list() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryBlobStore::open(temp.path()).await.unwrap();

        let a = store.put_blob(vec![1, 2, 3], "pak0.pak").await.unwrap();
        let b = store.put_blob(vec![4], "mymod.pak").await.unwrap();

        let blobs = store.list_blobs().await.unwrap();
        assert_eq!(blobs.len(), 2);
        assert!(blobs.iter().any(|i| i.id == a && i.size == 3));
        assert!(blobs.iter().any(|i| i.id == b && i.name == "mymod.pak"));
        assert!(temp.path().join("manifest.json").exists());
    }

    #[tokio::test]
    async fn test_resave_replaces() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryBlobStore::open(temp.path()).await.unwrap();

        let a = store.put_blob(vec![1, 2, 3], "pak0.pak").await.unwrap();
        let b = store.put_blob(vec![9, 9, 9], "pak0.pak").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.list_blobs().await.unwrap().len(), 1);
        assert_eq!(store.read_blob(&a).await.unwrap(), vec![9, 9, 9]);
        assert_eq!(
            store.get_blob("pak0.pak", 3).await.unwrap(),
            Some(a.clone())
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_blobs() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = DirectoryBlobStore::open(temp.path()).await.unwrap();
            store.put_blob(b"PACK".to_vec(), "x.pak").await.unwrap()
        };

        let store = DirectoryBlobStore::open(temp.path()).await.unwrap();
        assert_eq!(store.read_blob(&id).await.unwrap(), b"PACK".to_vec());
    }

    #[tokio::test]
    async fn test_delete_blob() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryBlobStore::open(temp.path()).await.unwrap();
        let id = store.put_blob(vec![1], "x.pak").await.unwrap();

        store.delete_blob(&id).await.unwrap();
        store.delete_blob("unknown").await.unwrap();

        assert!(store.list_blobs().await.unwrap().is_empty());
        assert!(matches!(
            store.read_blob(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_manifest() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("manifest.json"), b"{not json").unwrap();
        let store = DirectoryBlobStore::open(temp.path()).await.unwrap();

        assert!(matches!(
            store.list_blobs().await,
            Err(StoreError::Manifest(_))
        ));
    }
}
