//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::types::Region;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.width == 0 {
            return Err(ConfigError::ValidationError(
                "image.width must be > 0".into(),
            ));
        }
        if self.image.height == 0 {
            return Err(ConfigError::ValidationError(
                "image.height must be > 0".into(),
            ));
        }
        if let Some(region) = &self.image.region {
            let parsed = region
                .parse::<Region>()
                .map_err(|e| ConfigError::ValidationError(format!("image.region: {e}")))?;
            if parsed.width() == 0 || parsed.height() == 0 {
                return Err(ConfigError::ValidationError(
                    "image.region must not be empty".into(),
                ));
            }
        }
        if matches!(self.image.focal_length, Some(f) if f <= 0.0) {
            return Err(ConfigError::ValidationError(
                "image.focal_length must be > 0".into(),
            ));
        }
        if matches!(self.image.f_number, Some(f) if f <= 0.0) {
            return Err(ConfigError::ValidationError(
                "image.f_number must be > 0".into(),
            ));
        }
        if self.calibration.corner_rows == 0 || self.calibration.corner_cols == 0 {
            return Err(ConfigError::ValidationError(
                "calibration.corner_rows and calibration.corner_cols must be > 0".into(),
            ));
        }
        if self.processing.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.filter must not be empty".into(),
            ));
        }
        if let Err(e) = glob::Pattern::new(&self.processing.filter) {
            return Err(ConfigError::ValidationError(format!(
                "processing.filter is not a valid glob: {e}"
            )));
        }
        if self.output.global_csv.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.global_csv must not be empty".into(),
            ));
        }
        let email = self.observer.email.trim();
        if !email.is_empty() && !email.contains('@') {
            return Err(ConfigError::ValidationError(
                "observer.email must be an e-mail address".into(),
            ));
        }
        Ok(())
    }
}
