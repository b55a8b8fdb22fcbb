//! pakmount CLI - browse many PAK archives as one tree.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pakmount::config::{config_file_path, ConfigFile};
use pakmount::logging::init_logging;

mod commands;
mod error;

use commands::cache::CacheAction;
use commands::config::ConfigAction;
use commands::store::StoreAction;
use commands::{browse, pack, VfsArgs};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "pakmount", version = pakmount::VERSION, about = "Layered PAK archive browser")]
struct Cli {
    /// Configuration file (default: ~/.pakmount/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    vfs: VfsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List a directory of the merged tree
    Ls {
        /// Directory (default: root)
        #[arg(default_value = "")]
        dir: String,
    },

    /// Write a file's bytes to stdout
    Cat { path: String },

    /// Show size, kind and source archive of a file
    Stat { path: String },

    /// Find files by extension or glob
    Find {
        /// Extension such as `bsp` or `.pcx`
        #[arg(long, conflicts_with = "glob", required_unless_present = "glob")]
        ext: Option<String>,

        /// Glob such as `maps/*.bsp`
        #[arg(long)]
        glob: Option<String>,
    },

    /// Decode a file and print a summary
    Parse { path: String },

    /// Print the merged tree
    Tree {
        /// One subtree per archive, holding only the files it wins
        #[arg(long)]
        by_mount: bool,
    },

    /// List mounted archives in resolution order
    Mounts,

    /// List detected mods and expansions
    Mods,

    /// Build a PAK archive from files on disk
    Pack {
        /// Output archive
        output: PathBuf,

        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Strip this directory from member names
        #[arg(long)]
        base: Option<PathBuf>,
    },

    /// Content cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Stored archives
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    let path = path.cloned().unwrap_or_else(config_file_path);
    Ok(ConfigFile::load_from(&path)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut logging = config.logging_config();
    match cli.verbose {
        0 => {}
        1 => logging.level = "debug".to_string(),
        _ => logging.level = "trace".to_string(),
    }
    let _guard = match init_logging(&logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli, config: ConfigFile) -> Result<(), CliError> {
    match cli.command {
        Commands::Ls { dir } => browse::ls(&cli.vfs, &config, &dir).await,
        Commands::Cat { path } => browse::cat(&cli.vfs, &config, &path).await,
        Commands::Stat { path } => browse::stat(&cli.vfs, &config, &path).await,
        Commands::Find { ext, glob } => browse::find(&cli.vfs, &config, ext, glob).await,
        Commands::Parse { path } => browse::parse(&cli.vfs, &config, &path).await,
        Commands::Tree { by_mount } => browse::tree(&cli.vfs, &config, by_mount).await,
        Commands::Mounts => browse::mounts(&cli.vfs, &config).await,
        Commands::Mods => browse::mods(&cli.vfs, &config).await,
        Commands::Pack {
            output,
            files,
            base,
        } => pack::run(&output, &files, base.as_deref()),
        Commands::Cache { action } => commands::cache::run(action, &config).await,
        Commands::Store { action } => commands::store::run(action, &config).await,
        Commands::Config { action } => commands::config::run(action, &config, cli.config.as_ref()),
    }
}
