//! Cache management CLI commands.

use clap::Subcommand;
use pakmount::cache::{Cache, DiskCacheProvider};
use pakmount::config::{format_size, CacheBackend, ConfigFile};

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show disk cache statistics
    Stats,
    /// Clear the disk cache, removing all cached indexes and assets
    Clear,
}

/// Run a cache subcommand against the configured cache directory.
pub async fn run(action: CacheAction, config: &ConfigFile) -> Result<(), CliError> {
    let cache_dir = &config.cache.directory;
    if config.cache.backend == CacheBackend::Memory {
        println!("Note: configured backend is memory; showing the disk cache anyway");
    }

    let cache = DiskCacheProvider::open(cache_dir).await?;

    match action {
        CacheAction::Stats => {
            println!("Disk cache: {}", cache_dir.display());
            println!("  Entries: {}", cache.entry_count());
            println!("  Size:    {}", format_size(cache.size_bytes()));
        }
        CacheAction::Clear => {
            let entries = cache.entry_count();
            let bytes = cache.size_bytes();
            println!("Clearing disk cache at: {}", cache_dir.display());
            cache.clear().await?;
            println!("Deleted {} entries, freed {}", entries, format_size(bytes));
        }
    }
    Ok(())
}
