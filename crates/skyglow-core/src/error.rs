//! Error types for the skyglow reduction pipeline.
//!
//! Errors are organized by concern so the orchestrator can tell per-image
//! failures (skip or unregister the image) from batch-fatal ones (abort
//! and surface to the operator).

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SessionId;

/// Top-level error type for skyglow operations.
#[derive(Error, Debug)]
pub enum SkyglowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Camera geometry errors (batch-fatal)
    #[error("Camera configuration error: {0}")]
    Camera(#[from] CameraError),

    /// Per-image pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Working directory synchronization errors
    #[error("Synchronization error: {0}")]
    Sync(#[from] SyncError),

    /// Database errors
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors resolving the Bayer geometry of a camera model.
#[derive(Error, Debug)]
pub enum CameraError {
    /// The camera file has no table for this model
    #[error("Camera model not supported: '{0}'. Add a table for it to the camera file")]
    Unsupported(String),

    /// The camera file could not be read
    #[error("Failed to read camera file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The camera file is not valid TOML
    #[error("Failed to parse camera file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A channel entry is not an `"x,y,stride"` triple
    #[error("Invalid {channel} entry for camera '{model}': '{value}' (expected \"x,y,stride\")")]
    InvalidEntry {
        model: String,
        channel: String,
        value: String,
    },
}

/// Per-image processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// EXIF block unreadable, absent, or missing required tags
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// EXIF timestamp in an unsupported format
    #[error("Unsupported EXIF timestamp for {path}: '{value}'")]
    Timestamp { path: PathBuf, value: String },

    /// RAW sensor data could not be decoded
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Channel offsets do not fit the sensor plane
    #[error("Geometry error for {path}: {message}")]
    Geometry { path: PathBuf, message: String },

    /// The statistics region does not overlap the channel
    #[error("Region {region} is empty for a {rows}x{cols} channel")]
    EmptyRegion {
        region: String,
        rows: usize,
        cols: usize,
    },
}

impl PipelineError {
    /// Whether the image must be removed from the store.
    ///
    /// Images whose metadata cannot be read can never be reduced, so they
    /// are unregistered instead of being retried on every run.
    pub fn unregisters_image(&self) -> bool {
        matches!(self, Self::Metadata { .. } | Self::Timestamp { .. })
    }
}

/// Working directory synchronization errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Files in the working directory belong to several earlier sessions
    #[error(
        "Images in {work_dir} belong to different sessions {sessions:?}. \
         Point the tool at a single observation directory"
    )]
    MixingCandidates {
        work_dir: PathBuf,
        sessions: Vec<SessionId>,
    },

    /// The working directory cannot be listed
    #[error("Cannot read working directory {path}: {message}")]
    WorkDir { path: PathBuf, message: String },

    /// The file filter is not a valid glob pattern
    #[error("Invalid file filter '{filter}': {message}")]
    Filter { filter: String, message: String },
}

/// Convenience type alias for skyglow results.
pub type Result<T> = std::result::Result<T, SkyglowError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_errors_unregister() {
        let err = PipelineError::Metadata {
            path: PathBuf::from("a.cr2"),
            message: "no EXIF".into(),
        };
        assert!(err.unregisters_image());

        let err = PipelineError::Timestamp {
            path: PathBuf::from("a.cr2"),
            value: "yesterday".into(),
        };
        assert!(err.unregisters_image());
    }

    #[test]
    fn test_decode_errors_keep_image() {
        let err = PipelineError::Decode {
            path: PathBuf::from("a.cr2"),
            message: "truncated".into(),
        };
        assert!(!err.unregisters_image());
    }

    #[test]
    fn test_mixing_candidates_message_lists_sessions() {
        let err = SyncError::MixingCandidates {
            work_dir: PathBuf::from("/data/night"),
            sessions: vec![SessionId(20200101000000), SessionId(20200202000000)],
        };
        let msg = err.to_string();
        assert!(msg.contains("20200101000000"));
        assert!(msg.contains("20200202000000"));
    }
}
