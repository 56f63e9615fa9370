//! Config command - manage configuration files

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use scanline_core::config::{ConfigFile, sample_config};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the effective configuration
    Show,

    /// Generate a default config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
///
/// `path` overrides the default config location.
pub fn config(args: ConfigArgs, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            let state = if path.exists() { "exists" } else { "missing" };
            println!("{} ({})", path.display(), state);
        }
        ConfigCommand::Show => {
            if path.exists() {
                println!("# {}", path.display());
            } else {
                println!("# {} not found, showing defaults", path.display());
                println!("# run `scanline config init` to create it");
            }

            let config = ConfigFile::load_from(&path)?;
            let content =
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
            print!("{}", content);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists: {}", path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            ConfigFile::write_sample(&path)?;
            println!("Created configuration file: {}", path.display());
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
