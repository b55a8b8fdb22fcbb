//! CLI subcommands.

pub mod browse;
pub mod cache;
pub mod config;
pub mod pack;
pub mod store;

use std::path::{Path, PathBuf};

use clap::Args;
use pakmount::config::{ConfigFile, VfsConfig};
use pakmount::overlay::MountRequest;
use pakmount::store::DirectoryBlobStore;
use pakmount::{ArchiveVfs, VfsBuilder};
use tracing::{debug, warn};

use crate::error::CliError;

/// Archives to mount before running a browse command.
#[derive(Debug, Args)]
pub struct VfsArgs {
    /// Archive to mount; repeat for more. Later archives override earlier ones.
    #[arg(long = "pak", value_name = "FILE", global = true)]
    pub paks: Vec<PathBuf>,

    /// Also mount the archives saved in the store
    #[arg(long, global = true)]
    pub restore: bool,

    /// Decode on the calling thread instead of the worker pool
    #[arg(long, global = true)]
    pub no_pool: bool,
}

/// Archive member name for a file on disk.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Build the VFS and mount `--pak` archives in argument order with
/// ascending ranks.
pub async fn open_vfs(args: &VfsArgs, config: &ConfigFile) -> Result<ArchiveVfs, CliError> {
    let vfs_config = VfsConfig::from_config_file(config);
    let reorder = vfs_config.reorder;

    let mut builder = VfsBuilder::new().config(vfs_config);
    if args.no_pool {
        builder = builder.without_pool();
    }
    let vfs = builder.build().await?;

    if args.restore {
        let store = DirectoryBlobStore::open(&config.store.directory).await?;
        let restored = vfs.restore(&store).await?;
        debug!(count = restored.len(), "Restored stored archives");
    }

    for (position, path) in args.paks.iter().enumerate() {
        let bytes = std::fs::read(path).map_err(|e| CliError::io(path.display(), e))?;
        let request = MountRequest::new(display_name(path), bytes)
            .with_priority(reorder.rank_for(position));
        vfs.mount(request).await?;
    }

    if vfs.mounts().is_empty() {
        warn!("No archives mounted; pass --pak <FILE>");
    }
    Ok(vfs)
}
