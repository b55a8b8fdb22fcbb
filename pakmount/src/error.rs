//! Top-level error type for VFS operations.

use thiserror::Error;

use crate::cache::CacheError;
use crate::codec::DecodeError;
use crate::overlay::MountId;
use crate::pool::{PoolError, TaskCategory};
use crate::store::StoreError;

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors surfaced by [`ArchiveVfs`](crate::vfs::ArchiveVfs).
#[derive(Debug, Error)]
pub enum VfsError {
    /// No mount contains the path.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Archive or asset bytes are malformed.
    #[error("Decode error in {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: DecodeError,
    },

    /// A pool task exceeded its budget and local fallback is disabled.
    #[error("{category} worker timed out")]
    WorkerTimeout {
        category: TaskCategory,
        #[source]
        source: PoolError,
    },

    /// A pool task failed for another reason and local fallback is disabled.
    #[error("Worker pool error: {0}")]
    Pool(#[source] PoolError),

    #[error("Unknown mount: {0}")]
    UnknownMount(MountId),

    #[error("Mount id already in use: {0}")]
    DuplicateMount(MountId),

    /// A reorder list was not a permutation of the mounted ids.
    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    pub(crate) fn decode(context: impl Into<String>, source: DecodeError) -> Self {
        VfsError::Decode {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn from_pool(error: PoolError) -> Self {
        match error {
            PoolError::Timeout { category, .. } => VfsError::WorkerTimeout {
                category,
                source: error,
            },
            other => VfsError::Pool(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_not_found_display() {
        let err = VfsError::NotFound("x.txt".into());
        assert_eq!(err.to_string(), "File not found: x.txt");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_pool_maps_timeout() {
        let err = VfsError::from_pool(PoolError::Timeout {
            category: TaskCategory::AssetDecode,
            timeout: Duration::from_millis(50),
        });
        assert!(matches!(
            err,
            VfsError::WorkerTimeout {
                category: TaskCategory::AssetDecode,
                ..
            }
        ));

        let err = VfsError::from_pool(PoolError::ShutDown);
        assert!(matches!(err, VfsError::Pool(PoolError::ShutDown)));
    }

    #[test]
    fn test_decode_context() {
        let err = VfsError::decode(
            "pak0.pak",
            DecodeError::Invalid {
                format: "PAK",
                reason: "bad".into(),
            },
        );
        assert!(err.to_string().starts_with("Decode error in pak0.pak"));
    }
}
