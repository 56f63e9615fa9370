//! Scanline CLI
//!
//! KMS output discovery and GPU binding.
//!
//! # Usage
//!
//! ```bash
//! # List DRM device nodes and whether they can be used
//! scanline list
//!
//! # Open the first usable device and show its outputs
//! scanline probe
//!
//! # Same, as JSON and without touching Vulkan
//! scanline probe --json --no-gpu
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scanline_core::ConfigFile;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Scanline - KMS output discovery and GPU binding
#[derive(Parser)]
#[command(name = "scanline")]
#[command(author = "GhostKellz")]
#[command(version)]
#[command(about = "Find a KMS device, its active outputs and the matching Vulkan GPU", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the first usable device and show outputs and GPU binding
    Probe(commands::ProbeArgs),

    /// List candidate device nodes
    #[command(alias = "ls")]
    List,

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("scanline_core={}", level).parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load_or_default(),
    };

    match cli.command {
        Commands::Probe(args) => commands::probe(args, config)?,
        Commands::List => commands::list(&config)?,
        Commands::Config(args) => commands::config(args, cli.config)?,
    }

    Ok(())
}
