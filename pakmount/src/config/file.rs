//! INI configuration file.
//!
//! Stored at `~/.pakmount/config.ini`:
//!
//! ```ini
//! [pool]
//! archive_workers = auto
//! asset_workers = 4
//! timeout_ms = 30000
//! local_fallback = true
//!
//! [cache]
//! backend = disk
//! directory = /home/me/.pakmount/cache
//!
//! [store]
//! directory = /home/me/.pakmount/store
//!
//! [priority]
//! base_floor = 200
//! spacing = 10
//!
//! [logging]
//! level = info
//! file = /home/me/.pakmount/pakmount.log
//! ```
//!
//! Missing sections and keys take their defaults; unknown keys are ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::ConfigError;
use crate::overlay::{PriorityClass, PriorityRank, DEFAULT_REORDER_SPACING};
use crate::pool::DEFAULT_TASK_TIMEOUT;

const CONFIG_DIR_NAME: &str = ".pakmount";
const CONFIG_FILE_NAME: &str = "config.ini";
const AUTO: &str = "auto";

/// `~/.pakmount`, or `./.pakmount` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.pakmount/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Which [`Cache`](crate::cache::Cache) provider backs the content cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    #[default]
    Memory,
    Disk,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::Disk => "disk",
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "disk" => Ok(CacheBackend::Disk),
            _ => Err(()),
        }
    }
}

/// `[pool]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// `None` means one worker per available CPU.
    pub archive_workers: Option<usize>,
    pub asset_workers: Option<usize>,
    pub timeout_ms: u64,
    pub local_fallback: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            archive_workers: None,
            asset_workers: None,
            timeout_ms: DEFAULT_TASK_TIMEOUT.as_millis() as u64,
            local_fallback: true,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// Used by the disk backend.
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            directory: config_directory().join("cache"),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub directory: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("store"),
        }
    }
}

/// `[priority]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritySettings {
    pub base_floor: PriorityRank,
    pub spacing: PriorityRank,
}

impl Default for PrioritySettings {
    fn default() -> Self {
        Self {
            base_floor: PriorityClass::UserOverride.rank(),
            spacing: DEFAULT_REORDER_SPACING,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub pool: PoolSettings,
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub priority: PrioritySettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        let reader = Reader { ini: &ini };

        if let Some(v) = reader.get("pool", "archive_workers") {
            config.pool.archive_workers = parse_workers("pool", "archive_workers", v)?;
        }
        if let Some(v) = reader.get("pool", "asset_workers") {
            config.pool.asset_workers = parse_workers("pool", "asset_workers", v)?;
        }
        if let Some(v) = reader.parsed::<u64>("pool", "timeout_ms")? {
            if v == 0 {
                return Err(ConfigError::invalid("pool", "timeout_ms", "0"));
            }
            config.pool.timeout_ms = v;
        }
        if let Some(v) = reader.get("pool", "local_fallback") {
            config.pool.local_fallback = parse_bool("pool", "local_fallback", v)?;
        }

        if let Some(v) = reader.get("cache", "backend") {
            config.cache.backend = v
                .parse()
                .map_err(|_| ConfigError::invalid("cache", "backend", v))?;
        }
        if let Some(v) = reader.get("cache", "directory") {
            config.cache.directory = expand_home(v);
        }

        if let Some(v) = reader.get("store", "directory") {
            config.store.directory = expand_home(v);
        }

        if let Some(v) = reader.parsed("priority", "base_floor")? {
            config.priority.base_floor = v;
        }
        if let Some(v) = reader.parsed::<PriorityRank>("priority", "spacing")? {
            if v < 1 {
                return Err(ConfigError::invalid("priority", "spacing", &v.to_string()));
            }
            config.priority.spacing = v;
        }

        if let Some(v) = reader.get("logging", "level") {
            config.logging.level = v.to_string();
        }
        if let Some(v) = reader.get("logging", "file") {
            config.logging.file = Some(expand_home(v));
        }

        Ok(config)
    }

    /// Save to the default path, creating `~/.pakmount` if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    /// The file as it would be written by [`save`](Self::save).
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.to_ini().write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    fn to_ini(&self) -> Ini {
        let workers = |w: Option<usize>| w.map_or_else(|| AUTO.to_string(), |n| n.to_string());

        let mut ini = Ini::new();
        ini.with_section(Some("pool"))
            .set("archive_workers", workers(self.pool.archive_workers))
            .set("asset_workers", workers(self.pool.asset_workers))
            .set("timeout_ms", self.pool.timeout_ms.to_string())
            .set("local_fallback", self.pool.local_fallback.to_string());
        ini.with_section(Some("cache"))
            .set("backend", self.cache.backend.as_str())
            .set("directory", self.cache.directory.to_string_lossy());
        ini.with_section(Some("store"))
            .set("directory", self.store.directory.to_string_lossy());
        ini.with_section(Some("priority"))
            .set("base_floor", self.priority.base_floor.to_string())
            .set("spacing", self.priority.spacing.to_string());

        let mut logging = ini.with_section(Some("logging"));
        logging.set("level", self.logging.level.as_str());
        if let Some(file) = &self.logging.file {
            logging.set("file", file.to_string_lossy());
        }
        ini
    }
}

struct Reader<'a> {
    ini: &'a Ini,
}

impl Reader<'_> {
    /// Non-empty, trimmed value.
    fn get(&self, section: &'static str, key: &'static str) -> Option<&str> {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(
        &self,
        section: &'static str,
        key: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        match self.get(section, key) {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::invalid(section, key, v)),
            None => Ok(None),
        }
    }
}

fn parse_workers(
    section: &'static str,
    key: &'static str,
    value: &str,
) -> Result<Option<usize>, ConfigError> {
    if value.eq_ignore_ascii_case(AUTO) {
        return Ok(None);
    }
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::invalid(section, key, value)),
    }
}

fn parse_bool(section: &'static str, key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::invalid(section, key, value)),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
