//! Worker pool configuration.

use std::fmt;
use std::time::Duration;

/// Default per-task execution budget.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback worker count when the CPU count is unavailable.
pub const FALLBACK_WORKERS: usize = 2;

/// Kind of CPU-heavy work. Each category has its own slots and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskCategory {
    /// Reading an archive directory into an index.
    ArchiveIndex,
    /// Decoding a single asset.
    AssetDecode,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 2] = [TaskCategory::ArchiveIndex, TaskCategory::AssetDecode];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::ArchiveIndex => "archive-index",
            TaskCategory::AssetDecode => "asset-decode",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            TaskCategory::ArchiveIndex => 0,
            TaskCategory::AssetDecode => 1,
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryConfig {
    workers: usize,
    timeout: Duration,
}

impl CategoryConfig {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            timeout,
        }
    }

    /// Number of worker slots, at least 1.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execution budget per task, measured from slot assignment. Waiting
    /// for a free slot is bounded by the same duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub archive_index: CategoryConfig,
    pub asset_decode: CategoryConfig,
}

impl PoolConfig {
    /// Same worker count and timeout for every category.
    pub fn uniform(workers: usize, timeout: Duration) -> Self {
        Self {
            archive_index: CategoryConfig::new(workers, timeout),
            asset_decode: CategoryConfig::new(workers, timeout),
        }
    }

    pub fn category(&self, category: TaskCategory) -> CategoryConfig {
        match category {
            TaskCategory::ArchiveIndex => self.archive_index,
            TaskCategory::AssetDecode => self.asset_decode,
        }
    }

    pub fn with_workers(mut self, category: TaskCategory, workers: usize) -> Self {
        self.category_mut(category).workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, category: TaskCategory, timeout: Duration) -> Self {
        self.category_mut(category).timeout = timeout;
        self
    }

    fn category_mut(&mut self, category: TaskCategory) -> &mut CategoryConfig {
        match category {
            TaskCategory::ArchiveIndex => &mut self.archive_index,
            TaskCategory::AssetDecode => &mut self.asset_decode,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(FALLBACK_WORKERS);
        Self::uniform(cpus, DEFAULT_TASK_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_workers() {
        let config = PoolConfig::default();
        assert!(config.archive_index.workers() >= 1);
        assert_eq!(config.asset_decode.timeout(), DEFAULT_TASK_TIMEOUT);
    }

    #[test]
    fn test_workers_clamped() {
        let config = PoolConfig::uniform(0, Duration::from_millis(5));
        assert_eq!(config.archive_index.workers(), 1);

        let config = config.with_workers(TaskCategory::AssetDecode, 0);
        assert_eq!(config.asset_decode.workers(), 1);
    }

    #[test]
    fn test_per_category_overrides() {
        let config = PoolConfig::uniform(4, DEFAULT_TASK_TIMEOUT)
            .with_workers(TaskCategory::ArchiveIndex, 2)
            .with_timeout(TaskCategory::AssetDecode, Duration::from_millis(50));

        assert_eq!(config.category(TaskCategory::ArchiveIndex).workers(), 2);
        assert_eq!(config.category(TaskCategory::AssetDecode).workers(), 4);
        assert_eq!(
            config.category(TaskCategory::AssetDecode).timeout(),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_category_names() {
        assert_eq!(TaskCategory::ArchiveIndex.to_string(), "archive-index");
        assert_eq!(TaskCategory::AssetDecode.as_str(), "asset-decode");
        assert_eq!(TaskCategory::ALL.len(), 2);
    }
}
