//! In-memory blob store.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{BlobInfo, BlobStore, StoreError};
use crate::cache::BoxFuture;

/// Blob store kept entirely in memory. Used in tests and for sessions that
/// should not touch disk.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (BlobInfo, Vec<u8>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get_blob(
        &self,
        name: &str,
        size: u64,
    ) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        let id = super::blob_id(name, size);
        Box::pin(async move { Ok(self.blobs.read().contains_key(&id).then_some(id)) })
    }

    fn put_blob(&self, bytes: Vec<u8>, name: &str) -> BoxFuture<'_, Result<String, StoreError>> {
        let info = BlobInfo::new(name, bytes.len() as u64);
        Box::pin(async move {
            let id = info.id.clone();
            self.blobs.write().insert(id.clone(), (info, bytes));
            Ok(id)
        })
    }

    fn read_blob(&self, id: &str) -> BoxFuture<'_, Result<Vec<u8>, StoreError>> {
        let id = id.to_string();
        Box::pin(async move {
            self.blobs
                .read()
                .get(&id)
                .map(|(_, bytes)| bytes.clone())
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn list_blobs(&self) -> BoxFuture<'_, Result<Vec<BlobInfo>, StoreError>> {
        Box::pin(async move {
            let mut infos: Vec<BlobInfo> =
                self.blobs.read().values().map(|(i, _)| i.clone()).collect();
            infos.sort_by(|a, b| a.updated_at_ms.cmp(&b.updated_at_ms).then(a.id.cmp(&b.id)));
            Ok(infos)
        })
    }

    fn delete_blob(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let id = id.to_string();
        Box::pin(async move {
            self.blobs.write().remove(&id);
            Ok(())
        })
    }
}
