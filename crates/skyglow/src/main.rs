//! Skyglow CLI - sky brightness reduction of camera RAW frames.
//!
//! Skyglow reduces a folder of night-sky RAW frames to per-channel
//! statistics, subtracts a master dark built from the session's dark
//! frames, and exports the result as CSV.
//!
//! # Usage
//!
//! ```bash
//! # Reduce one observing session
//! skyglow reduce -w ./2020-01-01
//!
//! # Reduce every sub-directory as its own session
//! skyglow reduce -w ./observations --multiple
//!
//! # Start the latest session over
//! skyglow reset --latest
//!
//! # View configuration
//! skyglow config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Skyglow - sky brightness reduction of camera RAW frames.
#[derive(Parser, Debug)]
#[command(name = "skyglow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SKYGLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Reduce the RAW frames of a working directory
    Reduce(cli::reduce::ReduceArgs),

    /// Send a session back to its unprocessed state
    Reset(cli::reset::ResetArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// View and manage the camera geometry file
    Camera(cli::camera::CameraArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `skyglow config path`."
            );
            skyglow_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.quiet, cli.json_logs);

    tracing::debug!("Skyglow v{}", skyglow_core::VERSION);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Reduce(args) => cli::reduce::execute(args, config_path, cli.quiet),
        Commands::Reset(args) => cli::reset::execute(args, config_path),
        Commands::Config(args) => cli::config::execute(args, config_path),
        Commands::Camera(args) => cli::camera::execute(args, config_path),
    }
}
