//! Configuration.
//!
//! [`ConfigFile`] is the on-disk INI form; [`VfsConfig`] is what
//! [`VfsBuilder`](crate::vfs::VfsBuilder) consumes.

mod file;

pub use file::{
    config_directory, config_file_path, CacheBackend, CacheSettings, ConfigFile,
    LoggingSettings, PoolSettings, PrioritySettings, StoreSettings,
};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::overlay::PriorityReorderProtocol;
use crate::pool::{PoolConfig, TaskCategory};

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// In-process configuration for an [`ArchiveVfs`](crate::vfs::ArchiveVfs).
#[derive(Debug, Clone)]
pub struct VfsConfig {
    pub pool: PoolConfig,
    /// Decode locally when a pool task fails or times out.
    pub local_fallback: bool,
    pub reorder: PriorityReorderProtocol,
    pub cache: CacheSettings,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            local_fallback: true,
            reorder: PriorityReorderProtocol::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl VfsConfig {
    pub fn from_config_file(file: &ConfigFile) -> Self {
        let timeout = Duration::from_millis(file.pool.timeout_ms);
        let mut pool = PoolConfig::default()
            .with_timeout(TaskCategory::ArchiveIndex, timeout)
            .with_timeout(TaskCategory::AssetDecode, timeout);
        if let Some(n) = file.pool.archive_workers {
            pool = pool.with_workers(TaskCategory::ArchiveIndex, n);
        }
        if let Some(n) = file.pool.asset_workers {
            pool = pool.with_workers(TaskCategory::AssetDecode, n);
        }

        Self {
            pool,
            local_fallback: file.pool.local_fallback,
            reorder: PriorityReorderProtocol::new(
                file.priority.base_floor,
                file.priority.spacing,
            ),
            cache: file.cache.clone(),
        }
    }
}

impl ConfigFile {
    /// Settings for [`init_logging`](crate::logging::init_logging).
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            file: self.logging.file.clone(),
        }
    }
}

/// Human-readable byte count, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
