//! The `skyglow camera` command for the camera geometry file.

use clap::{Args, Subcommand};
use skyglow_core::{CameraCache, Channel, DEFAULT_CAMERA_TABLE};
use std::path::Path;

/// Arguments for the `camera` command.
#[derive(Args, Debug)]
pub struct CameraArgs {
    #[command(subcommand)]
    pub command: CameraCommand,
}

/// Subcommands for the camera geometry file.
#[derive(Subcommand, Debug)]
pub enum CameraCommand {
    /// Write the bundled camera table to the configured camera file
    Init {
        /// Overwrite existing camera file
        #[arg(long)]
        force: bool,
    },

    /// Show the Bayer channel geometry of a camera model
    Show {
        /// Camera model, exactly as in the EXIF "Image Model" tag
        model: String,
    },
}

/// Execute the camera command.
pub fn execute(args: CameraArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let path = config.camera_file();

    match args.command {
        CameraCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Camera file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CAMERA_TABLE)?;

            tracing::info!("Camera file created at: {}", path.display());
            println!("Camera file initialized at: {}", path.display());
        }

        CameraCommand::Show { model } => {
            let geometry = CameraCache::new(&path).lookup(&model).map_err(|e| {
                anyhow::anyhow!(
                    "{e}\n\n  Hint: Camera tables are read from {}",
                    path.display()
                )
            })?;
            println!("{model}");
            for channel in Channel::ALL {
                let g = geometry.channel(channel);
                println!(
                    "  {channel}: offset ({}, {}), stride {}",
                    g.offset_x, g.offset_y, g.stride
                );
            }
        }
    }

    Ok(())
}
