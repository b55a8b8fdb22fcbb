//! Configuration management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use pakmount::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand. `path_override` is the global `--config` flag.
pub fn run(
    action: ConfigAction,
    config: &ConfigFile,
    path_override: Option<&PathBuf>,
) -> Result<(), CliError> {
    let path = path_override.cloned().unwrap_or_else(config_file_path);

    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
            if !path.exists() {
                println!("(file does not exist; defaults are in effect)");
            }
        }
        ConfigAction::Show => {
            print!("{}", config.render());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                )));
            }
            ConfigFile::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        let config = ConfigFile::default();

        run(ConfigAction::Init { force: false }, &config, Some(&path)).unwrap();
        assert!(path.exists());

        let err = run(ConfigAction::Init { force: false }, &config, Some(&path)).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        run(ConfigAction::Init { force: true }, &config, Some(&path)).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}
