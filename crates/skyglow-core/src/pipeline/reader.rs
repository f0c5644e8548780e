//! The RAW image reader seam used by the reduction stages.

use std::path::Path;

use crate::error::PipelineResult;
use crate::types::ExifMetadata;

use super::decode::{RawDecoder, SensorPlane};
use super::metadata::MetadataExtractor;

/// Source of frame metadata and sensor data.
///
/// The reduction pipeline only talks to frames through this trait, so it
/// can be driven by synthetic frames.
pub trait FrameReader {
    /// EXIF fields of the frame.
    fn metadata(&self, path: &Path) -> PipelineResult<ExifMetadata>;

    /// Full sensor plane of the frame.
    fn raw_plane(&self, path: &Path) -> PipelineResult<SensorPlane>;
}

/// Reads camera RAW files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawFileReader;

impl FrameReader for RawFileReader {
    fn metadata(&self, path: &Path) -> PipelineResult<ExifMetadata> {
        MetadataExtractor::extract(path)
    }

    fn raw_plane(&self, path: &Path) -> PipelineResult<SensorPlane> {
        RawDecoder::decode(path)
    }
}
