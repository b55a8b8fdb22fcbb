//! Fluent construction of an [`ArchiveVfs`].

use std::sync::Arc;

use tracing::info;

use super::context::ArchiveVfs;
use crate::archive::{ArchiveCodec, PakCodec};
use crate::cache::{ContentCache, DiskCacheProvider, MemoryCacheProvider};
use crate::codec::{AssetCodec, QuakeAssetCodec};
use crate::config::{CacheBackend, VfsConfig};
use crate::error::{VfsError, VfsResult};
use crate::overlay::PriorityReorderProtocol;
use crate::pool::WorkerPool;

enum PoolSetting {
    /// Start a pool from [`VfsConfig::pool`].
    FromConfig,
    Provided(WorkerPool),
    /// Decode everything on tokio's blocking threads.
    Disabled,
}

/// Builder for [`ArchiveVfs`].
///
/// Anything not set explicitly comes from the [`VfsConfig`]: the cache
/// backend, the worker pool sizes, the reorder protocol and the fallback
/// policy. Codecs default to [`PakCodec`] and [`QuakeAssetCodec`].
///
/// # Example
///
/// ```
/// use pakmount::vfs::VfsBuilder;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let vfs = VfsBuilder::new().without_pool().build().await.unwrap();
/// assert!(vfs.mounts().is_empty());
/// # });
/// ```
pub struct VfsBuilder {
    config: VfsConfig,
    cache: Option<ContentCache>,
    archive_codec: Arc<dyn ArchiveCodec>,
    asset_codec: Arc<dyn AssetCodec>,
    pool: PoolSetting,
}

impl VfsBuilder {
    pub fn new() -> Self {
        Self {
            config: VfsConfig::default(),
            cache: None,
            archive_codec: Arc::new(PakCodec::new()),
            asset_codec: Arc::new(QuakeAssetCodec::new()),
            pool: PoolSetting::FromConfig,
        }
    }

    pub fn config(mut self, config: VfsConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this cache instead of one built from the config.
    pub fn cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn archive_codec(mut self, codec: impl ArchiveCodec + 'static) -> Self {
        self.archive_codec = Arc::new(codec);
        self
    }

    pub fn asset_codec(mut self, codec: impl AssetCodec + 'static) -> Self {
        self.asset_codec = Arc::new(codec);
        self
    }

    /// Share an existing pool.
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = PoolSetting::Provided(pool);
        self
    }

    pub fn without_pool(mut self) -> Self {
        self.pool = PoolSetting::Disabled;
        self
    }

    pub fn local_fallback(mut self, enabled: bool) -> Self {
        self.config.local_fallback = enabled;
        self
    }

    pub fn reorder_protocol(mut self, protocol: PriorityReorderProtocol) -> Self {
        self.config.reorder = protocol;
        self
    }

    /// Open the cache and start the pool.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Cache`] if the disk cache directory cannot be opened
    /// - [`VfsError::Pool`] if worker threads cannot be spawned
    pub async fn build(self) -> VfsResult<ArchiveVfs> {
        let cache = match self.cache {
            Some(cache) => cache,
            None => match self.config.cache.backend {
                CacheBackend::Memory => ContentCache::new(Arc::new(MemoryCacheProvider::new())),
                CacheBackend::Disk => ContentCache::new(Arc::new(
                    DiskCacheProvider::open(&self.config.cache.directory).await?,
                )),
            },
        };

        let pool = match self.pool {
            PoolSetting::FromConfig => {
                Some(WorkerPool::new(self.config.pool.clone()).map_err(VfsError::Pool)?)
            }
            PoolSetting::Provided(pool) => Some(pool),
            PoolSetting::Disabled => None,
        };

        info!(
            cache = cache.stats().backend,
            pool = pool.is_some(),
            local_fallback = self.config.local_fallback,
            reorder_floor = self.config.reorder.base_floor(),
            reorder_spacing = self.config.reorder.spacing(),
            "Archive VFS ready"
        );

        Ok(ArchiveVfs::new(
            cache,
            self.archive_codec,
            self.asset_codec,
            pool,
            self.config.local_fallback,
            self.config.reorder,
        ))
    }
}

impl Default for VfsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_build_starts_pool() {
        let vfs = VfsBuilder::new().build().await.unwrap();
        assert!(vfs.pool_stats().is_some());
        assert_eq!(vfs.cache_stats().backend, "memory");
        vfs.shutdown();
    }

    #[tokio::test]
    async fn test_disk_backend_from_config() {
        let temp = TempDir::new().unwrap();
        let config = VfsConfig {
            cache: CacheSettings {
                backend: CacheBackend::Disk,
                directory: temp.path().join("cache"),
            },
            ..VfsConfig::default()
        };

        let vfs = VfsBuilder::new()
            .config(config)
            .without_pool()
            .build()
            .await
            .unwrap();

        assert_eq!(vfs.cache_stats().backend, "disk");
        assert!(vfs.pool_stats().is_none());
        assert!(temp.path().join("cache").is_dir());
    }
}
