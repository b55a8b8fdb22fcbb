//! Persistent archive store.
//!
//! User-provided archives can be saved so they are re-mounted on the next
//! start. A [`BlobStore`] keeps raw archive bytes under an id derived from
//! the archive's name and size: saving the same archive twice updates the
//! existing blob instead of adding a second copy.
//!
//! Capacity and eviction are the store's own business; nothing in this
//! crate deletes blobs except an explicit [`BlobStore::delete_blob`].

mod directory;
mod memory;

pub use directory::DirectoryBlobStore;
pub use memory::MemoryBlobStore;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::BoxFuture;
use crate::fingerprint::sha256_hex;

/// Errors from a blob store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),
}

/// Metadata of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Last write time, milliseconds since the Unix epoch.
    pub updated_at_ms: i64,
}

impl BlobInfo {
    pub(crate) fn new(name: &str, size: u64) -> Self {
        Self {
            id: blob_id(name, size),
            name: name.to_string(),
            size,
            updated_at_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.updated_at_ms).single()
    }
}

/// Stable blob id for an archive name and size.
pub fn blob_id(name: &str, size: u64) -> String {
    let digest = sha256_hex(format!("{}\0{}", name, size).as_bytes());
    digest[..16].to_string()
}

/// Persistent store for archive bytes.
pub trait BlobStore: Send + Sync {
    /// Id of the blob saved under `name` with `size` bytes, if any.
    fn get_blob(
        &self,
        name: &str,
        size: u64,
    ) -> BoxFuture<'_, Result<Option<String>, StoreError>>;

    /// Save `bytes` as `name`, replacing a blob with the same name and size.
    fn put_blob(&self, bytes: Vec<u8>, name: &str) -> BoxFuture<'_, Result<String, StoreError>>;

    /// Load a blob's bytes.
    fn read_blob(&self, id: &str) -> BoxFuture<'_, Result<Vec<u8>, StoreError>>;

    /// All stored blobs, oldest first.
    fn list_blobs(&self) -> BoxFuture<'_, Result<Vec<BlobInfo>, StoreError>>;

    /// Delete a blob. Deleting an unknown id is not an error.
    fn delete_blob(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_depends_on_name_and_size() {
        assert_eq!(blob_id("pak0.pak", 10), blob_id("pak0.pak", 10));
        assert_ne!(blob_id("pak0.pak", 10), blob_id("pak0.pak", 11));
        assert_ne!(blob_id("pak0.pak", 10), blob_id("pak1.pak", 10));
        assert_eq!(blob_id("pak0.pak", 10).len(), 16);
    }

    #[test]
    fn test_blob_info_timestamp() {
        let info = BlobInfo::new("pak0.pak", 3);
        assert!(info.updated_at().is_some());
        assert_eq!(info.id, blob_id("pak0.pak", 3));
    }
}
