//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{ObserverTags, Region};

/// Locations of the database and the camera geometry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// SQLite database file
    pub database: PathBuf,

    /// Camera geometry file (one table per camera model)
    pub camera_file: PathBuf,

    /// Directory holding per-observer profiles for multi-directory runs
    pub observer_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("~/.skyglow/skyglow.db"),
            camera_file: PathBuf::from("~/.skyglow/cameras.toml"),
            observer_dir: PathBuf::from("~/.skyglow/observers"),
        }
    }
}

/// Observer identity copied onto every registered image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub observer: String,
    pub organization: String,
    pub email: String,
    pub location: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            observer: "Unknown".to_string(),
            organization: String::new(),
            email: String::new(),
            location: "Unknown".to_string(),
        }
    }
}

impl ObserverConfig {
    /// Tags stored in the database; empty optional fields become NULL.
    pub fn tags(&self) -> ObserverTags {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        ObserverTags {
            observer: self.observer.trim().to_string(),
            organization: non_empty(&self.organization),
            email: non_empty(&self.email),
            location: self.location.trim().to_string(),
        }
    }
}

/// Region of interest and optics fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Width of the centered statistics window, in channel pixels
    pub width: usize,

    /// Height of the centered statistics window, in channel pixels
    pub height: usize,

    /// Explicit window `[x1:x2,y1:y2]`; overrides centering when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Focal length (mm) used when EXIF omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,

    /// F-number used when EXIF omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 400,
            region: None,
            focal_length: None,
            f_number: None,
        }
    }
}

impl ImageConfig {
    /// How the statistics window is chosen for every image.
    ///
    /// Call after `Config::validate()`, which rejects unparsable regions.
    pub fn roi(&self) -> RoiSpec {
        match self.region.as_deref().map(str::parse::<Region>) {
            Some(Ok(region)) => RoiSpec::Fixed(region),
            _ => RoiSpec::Centered {
                width: self.width,
                height: self.height,
            },
        }
    }
}

/// Statistics window policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiSpec {
    /// Window of this size centered on each channel
    Centered { width: usize, height: usize },
    /// The same window for every image
    Fixed(Region),
}

/// Calibration constants of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Measure the bias corner window of every image
    pub bias_corner: bool,

    /// Rows counted from the bottom edge of each channel
    pub corner_rows: usize,

    /// Columns counted from the right edge of each channel
    pub corner_cols: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        // Tuned for ~2600x1730 channel planes (18 MP APS-C sensors).
        Self {
            bias_corner: true,
            corner_rows: 410,
            corner_cols: 610,
        }
    }
}

/// Working directory scanning and classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Glob filter applied to file names in the working directory
    pub filter: String,

    /// Classify files named `*BIAS*` as BIAS frames
    pub detect_bias: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            filter: "*.*".to_string(),
            detect_bias: false,
        }
    }
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one CSV file per session plus the global file
    pub csv_dir: PathBuf,

    /// File name of the cumulative CSV file inside `csv_dir`
    pub global_csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("~/.skyglow/csv"),
            global_csv: "skyglow.csv".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Per-observer overrides, loaded from `<observer_dir>/<name>.toml`.
///
/// Every field is optional; unset fields keep the global value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverProfile {
    pub observer: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub focal_length: Option<f64>,
    pub f_number: Option<f64>,
}
