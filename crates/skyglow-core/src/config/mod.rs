//! Configuration management for skyglow.
//!
//! Configuration is loaded from the platform config directory
//! (`config.toml`) with sensible defaults for every section.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for skyglow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database and camera file locations
    pub general: GeneralConfig,

    /// Observer identity
    pub observer: ObserverConfig,

    /// Region of interest and optics fallbacks
    pub image: ImageConfig,

    /// Bias corner window
    pub calibration: CalibrationConfig,

    /// Working directory scanning
    pub processing: ProcessingConfig,

    /// CSV export
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/org.skyglow.skyglow/config.toml
    /// - Linux: ~/.config/skyglow/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\skyglow\config\config.toml
    ///
    /// Falls back to ~/.skyglow/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "skyglow", "skyglow")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".skyglow").join("config.toml")
            })
    }

    /// Resolved database path (with ~ expansion).
    pub fn database_path(&self) -> PathBuf {
        expand(&self.general.database)
    }

    /// Resolved camera file path (with ~ expansion).
    pub fn camera_file(&self) -> PathBuf {
        expand(&self.general.camera_file)
    }

    /// Resolved CSV output directory (with ~ expansion).
    pub fn csv_dir(&self) -> PathBuf {
        expand(&self.output.csv_dir)
    }

    /// Resolved path of the observer profile named `name`.
    pub fn observer_profile_path(&self, name: &str) -> PathBuf {
        expand(&self.general.observer_dir).join(format!("{name}.toml"))
    }

    /// Load the observer profile for `name`, if one exists.
    pub fn load_observer_profile(&self, name: &str) -> Result<Option<ObserverProfile>, ConfigError> {
        let path = self.observer_profile_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let profile: ObserverProfile = toml::from_str(&content)?;
        tracing::info!("Using observer profile {}", path.display());
        Ok(Some(profile))
    }

    /// A copy of this configuration with the profile's fields applied.
    pub fn with_observer_profile(&self, profile: &ObserverProfile) -> Self {
        let mut config = self.clone();
        let observer = &mut config.observer;
        if let Some(v) = &profile.observer {
            observer.observer = v.clone();
        }
        if let Some(v) = &profile.organization {
            observer.organization = v.clone();
        }
        if let Some(v) = &profile.email {
            observer.email = v.clone();
        }
        if let Some(v) = &profile.location {
            observer.location = v.clone();
        }
        if profile.focal_length.is_some() {
            config.image.focal_length = profile.focal_length;
        }
        if profile.f_number.is_some() {
            config.image.f_number = profile.f_number;
        }
        config
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.image.width, 500);
        assert_eq!(config.image.height, 400);
        assert_eq!(config.processing.filter, "*.*");
        assert_eq!(config.calibration.corner_rows, 410);
        assert_eq!(config.calibration.corner_cols, 610);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[observer]"));
        assert!(toml.contains("[calibration]"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[observer]\nobserver = \"Jane Roe\"\nlocation = \"Madrid\"\n\n[image]\nwidth = 300\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.observer.observer, "Jane Roe");
        assert_eq!(config.image.width, 300);
        assert_eq!(config.image.height, 400);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[image]\nwidth = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("image.width"));
    }

    #[test]
    fn test_observer_profile_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.observer_dir = dir.path().to_path_buf();
        config.observer.email = "global@example.org".into();
        std::fs::write(
            dir.path().join("jane.toml"),
            "observer = \"Jane Roe\"\nfocal_length = 35.0\n",
        )
        .unwrap();

        assert!(config.load_observer_profile("nobody").unwrap().is_none());
        let profile = config.load_observer_profile("jane").unwrap().unwrap();
        let merged = config.with_observer_profile(&profile);
        assert_eq!(merged.observer.observer, "Jane Roe");
        assert_eq!(merged.observer.email, "global@example.org");
        assert_eq!(merged.image.focal_length, Some(35.0));
    }

    #[test]
    fn test_paths_expand_tilde() {
        let config = Config::default();
        assert!(!config.database_path().to_string_lossy().starts_with('~'));
        assert!(config.database_path().ends_with(".skyglow/skyglow.db"));
    }
}
