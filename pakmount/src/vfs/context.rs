//! The archive VFS context.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveCodec, ArchiveIndex};
use crate::cache::{CacheNamespace, CacheStats, ContentCache};
use crate::codec::{extension, file_name, pcx_palette, Asset, AssetCodec, AssetKind};
use crate::error::{VfsError, VfsResult};
use crate::fingerprint::ContentFingerprint;
use crate::overlay::{
    build_tree, detect_mod, detect_mods, DirectoryListing, FileStat, ModInfo, Mount,
    MountHandle, MountId, MountInfo, MountRegistry, MountRequest, OverlayIndex, PriorityClass,
    PriorityRank, PriorityReorderProtocol, TreeNode, ViewMode,
};
use crate::pool::{PoolError, PoolStats, TaskCategory, WorkerPool};
use crate::store::BlobStore;

const PALETTE_PATH: &str = "pics/colormap.pcx";

/// Everything known about one resolved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub source_mount_id: MountId,
    /// Display name of the winning mount.
    pub source_mount: String,
    pub extension: String,
    pub kind: AssetKind,
}

/// Registry plus the overlay derived from it. Only mutated under the write
/// lock, and the overlay is rebuilt before the lock is released.
#[derive(Default)]
struct VfsState {
    registry: MountRegistry,
    overlay: OverlayIndex,
}

impl VfsState {
    fn rebuild(&mut self) {
        let started = Instant::now();
        self.overlay = OverlayIndex::build(self.registry.ordered());
        debug!(
            mounts = self.registry.len(),
            files = self.overlay.len(),
            directories = self.overlay.directory_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Overlay rebuilt"
        );
    }
}

/// One merged namespace over many archives.
///
/// Created with [`VfsBuilder`](super::VfsBuilder) and passed to whoever
/// needs it; there is no global instance. Reads and lookups take a shared
/// lock; mount changes take the write lock and rebuild the overlay before
/// releasing it, so readers never observe a registry and overlay that
/// disagree.
pub struct ArchiveVfs {
    state: RwLock<VfsState>,
    cache: ContentCache,
    archive_codec: Arc<dyn ArchiveCodec>,
    asset_codec: Arc<dyn AssetCodec>,
    pool: Option<WorkerPool>,
    local_fallback: bool,
    reorder: PriorityReorderProtocol,
}

impl ArchiveVfs {
    pub(crate) fn new(
        cache: ContentCache,
        archive_codec: Arc<dyn ArchiveCodec>,
        asset_codec: Arc<dyn AssetCodec>,
        pool: Option<WorkerPool>,
        local_fallback: bool,
        reorder: PriorityReorderProtocol,
    ) -> Self {
        Self {
            state: RwLock::new(VfsState::default()),
            cache,
            archive_codec,
            asset_codec,
            pool,
            local_fallback,
            reorder,
        }
    }

    // ---- mounts ----

    /// Load an archive and add it to the overlay.
    ///
    /// The archive index is taken from the cache when an archive with the
    /// same fingerprint was indexed before. Without an explicit rank, the
    /// rank comes from mod detection, then defaults to
    /// [`PriorityClass::UserOverride`] for user-provided archives and
    /// [`PriorityClass::Base`] otherwise.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Decode`] if the archive is malformed; nothing is registered
    /// - [`VfsError::DuplicateMount`] if the requested id is taken
    pub async fn mount(&self, request: MountRequest) -> VfsResult<MountHandle> {
        let MountRequest {
            bytes,
            id,
            display_name,
            is_user_provided,
            priority_rank,
        } = request;

        if let Some(id) = &id {
            if self.state.read().registry.contains(id) {
                return Err(VfsError::DuplicateMount(id.clone()));
            }
        }

        let fingerprint = ContentFingerprint::compute(&bytes, &display_name);
        let index = self.archive_index(&display_name, &fingerprint, &bytes).await?;

        let detected = detect_mod(&display_name, &index, &bytes);
        let rank = priority_rank
            .or_else(|| detected.as_ref().map(|m| m.priority))
            .unwrap_or_else(|| default_rank(is_user_provided));

        let mut state = self.state.write();
        let id = id.unwrap_or_else(|| state.registry.unique_id(&display_name));
        let mount = Mount {
            id,
            display_name,
            priority_rank: rank,
            sequence: 0,
            fingerprint,
            is_user_provided,
            index: Arc::new(index),
            data: bytes,
        };

        let mount = state.registry.insert(mount)?;
        let handle = MountHandle {
            id: mount.id().clone(),
            fingerprint: mount.fingerprint().clone(),
            priority_rank: mount.priority_rank(),
            file_count: mount.index().len(),
        };
        info!(
            mount_id = %handle.id,
            archive = %mount.display_name(),
            rank = handle.priority_rank,
            files = handle.file_count,
            fingerprint = %handle.fingerprint.short(),
            mod_id = detected.as_ref().map(|m| m.id.as_str()).unwrap_or("-"),
            "Mounted archive"
        );
        state.rebuild();
        Ok(handle)
    }

    async fn archive_index(
        &self,
        display_name: &str,
        fingerprint: &ContentFingerprint,
        bytes: &Bytes,
    ) -> VfsResult<ArchiveIndex> {
        if let Some(index) = self
            .cache
            .get_value::<ArchiveIndex>(CacheNamespace::ArchiveIndex, fingerprint.as_str())
            .await
        {
            debug!(archive = %display_name, files = index.len(), "Archive index from cache");
            return Ok(index);
        }

        let codec = Arc::clone(&self.archive_codec);
        let data = bytes.clone();
        let index = self
            .run(TaskCategory::ArchiveIndex, display_name, move || {
                codec.index(&data)
            })
            .await?
            .map_err(|e| VfsError::decode(display_name, e))?;

        self.cache
            .set_value(CacheNamespace::ArchiveIndex, fingerprint.as_str(), &index)
            .await;
        Ok(index)
    }

    /// Remove a mount. Paths it won fall through to the next mount that
    /// has them.
    pub fn unmount(&self, id: &MountId) -> VfsResult<MountInfo> {
        let mut state = self.state.write();
        let mount = state.registry.remove(id)?;
        state.rebuild();
        info!(mount_id = %id, archive = %mount.display_name(), "Unmounted archive");
        Ok(mount.info())
    }

    /// Change one mount's rank.
    pub fn update_priority(&self, id: &MountId, rank: PriorityRank) -> VfsResult<()> {
        let mut state = self.state.write();
        let previous = state.registry.set_priority(id, rank)?;
        state.rebuild();
        info!(mount_id = %id, from = previous, to = rank, "Mount priority changed");
        Ok(())
    }

    /// Re-rank every mount from an explicit order, lowest priority first.
    ///
    /// `order` must list every mounted id exactly once; otherwise nothing
    /// changes. The overlay is rebuilt once.
    pub fn reorder(&self, order: &[MountId]) -> VfsResult<()> {
        let mut state = self.state.write();
        let ranks = self.reorder.apply(&mut state.registry, order)?;
        state.rebuild();
        info!(
            mounts = ranks.len(),
            floor = self.reorder.base_floor(),
            spacing = self.reorder.spacing(),
            "Mounts reordered"
        );
        Ok(())
    }

    /// Snapshot of every mount in resolution order (lowest priority first).
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.state.read().registry.list()
    }

    pub fn mount_info(&self, id: &MountId) -> Option<MountInfo> {
        self.state.read().registry.get(id).map(Mount::info)
    }

    /// Unmount everything.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let count = state.registry.len();
        state.registry.clear();
        state.rebuild();
        info!(mounts = count, "Cleared all mounts");
    }

    // ---- lookups ----

    /// Bytes of the winning copy of `path`.
    pub fn read(&self, path: &str) -> VfsResult<Bytes> {
        let state = self.state.read();
        let source = state
            .overlay
            .resolve(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        let mount = state
            .registry
            .get(&source.mount_id)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        Ok(mount.read_entry(&source.entry))
    }

    pub fn stat(&self, path: &str) -> VfsResult<FileStat> {
        self.state
            .read()
            .overlay
            .stat(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.read().overlay.contains(path)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.state.read().overlay.is_directory(path)
    }

    /// Merged listing of `dir`; `""` is the root.
    pub fn list(&self, dir: &str) -> DirectoryListing {
        self.state.read().overlay.list(dir)
    }

    pub fn find_by_extension(&self, ext: &str) -> Vec<FileStat> {
        self.state.read().overlay.find_by_extension(ext)
    }

    /// Files whose path matches a glob such as `maps/*.bsp`
    /// (case-insensitive).
    pub fn find_matching(&self, pattern: &str) -> VfsResult<Vec<FileStat>> {
        let glob = glob::Pattern::new(pattern).map_err(|e| VfsError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(self.state.read().overlay.find_matching(&glob))
    }

    pub fn metadata(&self, path: &str) -> VfsResult<FileMetadata> {
        let state = self.state.read();
        let stat = state
            .overlay
            .stat(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        let source_mount = state
            .registry
            .get(&stat.source_mount_id)
            .map(|m| m.display_name().to_string())
            .unwrap_or_default();

        Ok(FileMetadata {
            name: file_name(&stat.path).to_string(),
            extension: extension(&stat.path),
            kind: AssetKind::from_path(&stat.path),
            size: stat.size,
            source_mount,
            source_mount_id: stat.source_mount_id,
            path: stat.path,
        })
    }

    /// Number of resolved files.
    pub fn file_count(&self) -> usize {
        self.state.read().overlay.len()
    }

    pub fn file_tree(&self, mode: ViewMode) -> TreeNode {
        let state = self.state.read();
        build_tree(&state.overlay, state.registry.ordered(), mode)
    }

    /// Mods and expansions among the current mounts.
    pub fn detect_mods(&self) -> Vec<ModInfo> {
        detect_mods(self.state.read().registry.ordered())
    }

    /// The 768-byte game palette from the winning `pics/colormap.pcx`.
    pub fn palette(&self) -> Option<Vec<u8>> {
        let data = self.read(PALETTE_PATH).ok()?;
        pcx_palette(&data).map(<[u8]>::to_vec)
    }

    // ---- decoding ----

    /// Decode the winning copy of `path`.
    ///
    /// Decoded assets are cached under the owning archive's fingerprint,
    /// so a later parse of the same bytes skips the codec. Decoding runs on
    /// the worker pool; when the pool fails or times out and local fallback
    /// is enabled, the same decode runs on a blocking thread instead.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if no mount has `path`
    /// - [`VfsError::Decode`] if the codec rejects the bytes
    /// - [`VfsError::WorkerTimeout`] / [`VfsError::Pool`] when the pool
    ///   fails and local fallback is disabled
    pub async fn parse(&self, path: &str) -> VfsResult<Asset> {
        let (normalized, fingerprint, data) = {
            let state = self.state.read();
            let source = state
                .overlay
                .resolve(path)
                .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
            let mount = state
                .registry
                .get(&source.mount_id)
                .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
            (
                source.entry.path.clone(),
                mount.fingerprint().clone(),
                mount.read_entry(&source.entry),
            )
        };

        let key = ContentCache::asset_key(&fingerprint, &normalized);
        if let Some(asset) = self
            .cache
            .get_value::<Asset>(CacheNamespace::ParsedAsset, &key)
            .await
        {
            return Ok(asset);
        }

        let codec = Arc::clone(&self.asset_codec);
        let task_path = normalized.clone();
        let asset = self
            .run(TaskCategory::AssetDecode, &normalized, move || {
                codec.decode(&task_path, &data)
            })
            .await?
            .map_err(|e| VfsError::decode(normalized.as_str(), e))?;

        self.cache
            .set_value(CacheNamespace::ParsedAsset, &key, &asset)
            .await;
        Ok(asset)
    }

    /// Run a CPU-heavy task on the pool, falling back to a blocking thread.
    async fn run<T, F>(&self, category: TaskCategory, subject: &str, task: F) -> VfsResult<T>
    where
        F: FnOnce() -> T + Clone + Send + 'static,
        T: Send + 'static,
    {
        let Some(pool) = &self.pool else {
            return run_local(category, task).await;
        };

        let error = match pool.dispatch(category, task.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !self.local_fallback {
            return Err(VfsError::from_pool(error));
        }
        warn!(
            category = %category,
            subject = %subject,
            error = %error,
            "Worker pool failed, running locally"
        );
        run_local(category, task).await
    }

    // ---- persistence ----

    /// Save a mount's archive bytes to `store`. Returns the blob id.
    pub async fn persist(&self, id: &MountId, store: &dyn BlobStore) -> VfsResult<String> {
        let (name, data) = {
            let state = self.state.read();
            let mount = state
                .registry
                .get(id)
                .ok_or_else(|| VfsError::UnknownMount(id.clone()))?;
            (mount.display_name().to_string(), mount.data().clone())
        };

        let size = data.len() as u64;
        if let Some(existing) = store.get_blob(&name, size).await? {
            debug!(mount_id = %id, blob_id = %existing, "Archive already stored, replacing");
        }
        let blob_id = store.put_blob(data.to_vec(), &name).await?;
        info!(mount_id = %id, blob_id = %blob_id, size, "Persisted archive");
        Ok(blob_id)
    }

    /// Mount every archive in `store` as user-provided.
    ///
    /// Archives whose fingerprint is already mounted are skipped. A stored
    /// archive that fails to load is logged and skipped so the others still
    /// come back.
    pub async fn restore(&self, store: &dyn BlobStore) -> VfsResult<Vec<MountHandle>> {
        let blobs = store.list_blobs().await?;
        let mut handles = Vec::with_capacity(blobs.len());

        for blob in blobs {
            let bytes = match store.read_blob(&blob.id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        blob_id = %blob.id,
                        archive = %blob.name,
                        error = %e,
                        "Failed to read stored archive"
                    );
                    continue;
                }
            };
            let fingerprint = ContentFingerprint::compute(&bytes, &blob.name);
            let already_mounted = self
                .state
                .read()
                .registry
                .ordered()
                .iter()
                .any(|m| m.fingerprint() == &fingerprint);
            if already_mounted {
                debug!(blob_id = %blob.id, archive = %blob.name, "Stored archive already mounted");
                continue;
            }

            match self
                .mount(MountRequest::new(blob.name.clone(), bytes).user_provided(true))
                .await
            {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(blob_id = %blob.id, archive = %blob.name, error = %e, "Failed to restore archive")
                }
            }
        }

        info!(restored = handles.len(), "Restored stored archives");
        Ok(handles)
    }

    // ---- lifecycle ----

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(WorkerPool::stats)
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop the worker pool. Later decodes run locally when fallback is
    /// enabled.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }
}

impl fmt::Debug for ArchiveVfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ArchiveVfs")
            .field("mounts", &state.registry.len())
            .field("files", &state.overlay.len())
            .field("cache", &self.cache)
            .field("pool", &self.pool.is_some())
            .field("local_fallback", &self.local_fallback)
            .finish()
    }
}

fn default_rank(is_user_provided: bool) -> PriorityRank {
    if is_user_provided {
        PriorityClass::UserOverride.rank()
    } else {
        PriorityClass::Base.rank()
    }
}

async fn run_local<T, F>(category: TaskCategory, task: F) -> VfsResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        VfsError::Pool(PoolError::TaskPanicked {
            category,
            message: e.to_string(),
        })
    })
}
