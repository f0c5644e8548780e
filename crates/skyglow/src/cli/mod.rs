//! Command handlers.

pub mod camera;
pub mod config;
pub mod reduce;
pub mod reset;

use skyglow_core::Config;
use std::path::Path;

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from(path)?),
        None => Ok(Config::load()?),
    }
}
