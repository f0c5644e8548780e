//! Filename-based frame classification.

use crate::types::ImageType;

/// Classifies frames from their file names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    detect_bias: bool,
}

impl Classifier {
    /// With `detect_bias`, names containing `BIAS` get their own bucket.
    pub fn new(detect_bias: bool) -> Self {
        Self { detect_bias }
    }

    /// `DARK` anywhere in the name (any case) marks a dark frame;
    /// everything else is a light frame.
    pub fn classify(&self, name: &str) -> ImageType {
        let upper = name.to_uppercase();
        if upper.contains("DARK") {
            ImageType::Dark
        } else if self.detect_bias && upper.contains("BIAS") {
            ImageType::Bias
        } else {
            ImageType::Light
        }
    }
}
