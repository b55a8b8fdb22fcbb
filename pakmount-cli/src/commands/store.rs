//! Stored archive commands.
//!
//! Stored archives are re-mounted by any browse command run with
//! `--restore`.

use std::path::PathBuf;

use clap::Subcommand;
use pakmount::config::{format_size, ConfigFile};
use pakmount::store::{BlobStore, DirectoryBlobStore};

use super::display_name;
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum StoreAction {
    /// List stored archives
    List,
    /// Copy an archive into the store
    Add {
        /// Archive file
        file: PathBuf,
    },
    /// Remove a stored archive
    Remove {
        /// Blob id as printed by `store list`
        id: String,
    },
}

pub async fn run(action: StoreAction, config: &ConfigFile) -> Result<(), CliError> {
    let store = DirectoryBlobStore::open(&config.store.directory).await?;

    match action {
        StoreAction::List => {
            let blobs = store.list_blobs().await?;
            if blobs.is_empty() {
                println!("No stored archives in {}", store.root().display());
            }
            for blob in blobs {
                let updated = blob
                    .updated_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {:<24} {:>10}  {}",
                    blob.id,
                    blob.name,
                    format_size(blob.size),
                    updated
                );
            }
        }
        StoreAction::Add { file } => {
            let bytes = std::fs::read(&file).map_err(|e| CliError::io(file.display(), e))?;
            let name = display_name(&file);
            if let Some(existing) = store.get_blob(&name, bytes.len() as u64).await? {
                println!("Replacing stored archive {}", existing);
            }
            let id = store.put_blob(bytes, &name).await?;
            println!("Stored {} as {}", name, id);
        }
        StoreAction::Remove { id } => {
            store.delete_blob(&id).await?;
            println!("Removed {}", id);
        }
    }
    Ok(())
}
