//! CLI error type.

use std::fmt;

use pakmount::cache::CacheError;
use pakmount::codec::DecodeError;
use pakmount::config::ConfigError;
use pakmount::store::StoreError;
use pakmount::VfsError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be read or is invalid.
    Config(ConfigError),

    /// A VFS operation failed.
    Vfs(VfsError),

    /// Content cache failure.
    Cache(CacheError),

    /// Blob store failure.
    Store(StoreError),

    /// Building an archive failed.
    Pack(DecodeError),

    /// Local file I/O failed.
    Io { path: String, source: std::io::Error },

    /// Invalid command-line usage not caught by argument parsing.
    Usage(String),
}

impl CliError {
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Process exit status: 2 for usage and configuration problems, 3 for
    /// missing files, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) | CliError::Config(_) => 2,
            CliError::Vfs(e) if e.is_not_found() => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Vfs(e) => write!(f, "{}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Store(e) => write!(f, "Store error: {}", e),
            CliError::Pack(e) => write!(f, "Failed to build archive: {}", e),
            CliError::Io { path, source } => write!(f, "{}: {}", path, source),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Vfs(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Pack(e) => Some(e),
            CliError::Io { source, .. } => Some(source),
            CliError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<VfsError> for CliError {
    fn from(e: VfsError) -> Self {
        CliError::Vfs(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<DecodeError> for CliError {
    fn from(e: DecodeError) -> Self {
        CliError::Pack(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage("bad".into()).exit_code(), 2);
        assert_eq!(
            CliError::Vfs(VfsError::NotFound("x".into())).exit_code(),
            3
        );
        assert_eq!(
            CliError::Store(StoreError::NotFound("id".into())).exit_code(),
            1
        );
    }

    #[test]
    fn test_io_display_includes_path() {
        let err = CliError::io(
            "pak0.pak",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "pak0.pak: gone");
    }
}
