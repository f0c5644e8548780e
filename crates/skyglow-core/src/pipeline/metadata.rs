//! EXIF metadata extraction from RAW frames.

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::ExifMetadata;

/// Timestamp layouts accepted from the EXIF DateTime tags.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Extracts the EXIF fields stored with every image.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract EXIF metadata from a RAW file.
    ///
    /// Unlike optional fields, the camera model and capture time are
    /// required: without them the frame cannot be reduced.
    pub fn extract(path: &Path) -> PipelineResult<ExifMetadata> {
        let file = File::open(path).map_err(|e| PipelineError::Metadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| PipelineError::Metadata {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::from_exif(path, &exif)
    }

    fn from_exif(path: &Path, exif: &Exif) -> PipelineResult<ExifMetadata> {
        let model = Self::get_ascii(exif, Tag::Model).ok_or_else(|| PipelineError::Metadata {
            path: path.to_path_buf(),
            message: "missing camera model".to_string(),
        })?;

        let raw_tstamp = Self::get_ascii(exif, Tag::DateTime)
            .or_else(|| Self::get_ascii(exif, Tag::DateTimeOriginal))
            .ok_or_else(|| PipelineError::Metadata {
                path: path.to_path_buf(),
                message: "missing capture time".to_string(),
            })?;
        let tstamp = normalize_timestamp(&raw_tstamp).ok_or_else(|| PipelineError::Timestamp {
            path: path.to_path_buf(),
            value: raw_tstamp.clone(),
        })?;

        Ok(ExifMetadata {
            tstamp,
            model,
            iso: Self::get_u32(exif, Tag::PhotographicSensitivity),
            exptime: Self::get_exptime(exif),
            focal_length: Self::get_rational(exif, Tag::FocalLength).and_then(positive),
            f_number: Self::get_rational(exif, Tag::FNumber).and_then(positive),
        })
    }

    /// First ASCII value of a tag, trimmed of padding.
    fn get_ascii(exif: &Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(values) => values
                .first()
                .map(|v| String::from_utf8_lossy(v).trim_end_matches('\0').trim().to_string())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    fn get_u32(exif: &Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Short(v) => v.first().map(|&x| x as u32),
                Value::Long(v) => v.first().copied(),
                _ => None,
            })
    }

    fn get_rational(exif: &Exif, tag: Tag) -> Option<f64> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Rational(v) => v.first().map(|r| r.to_f64()),
                Value::Short(v) => v.first().map(|&x| x as f64),
                Value::Long(v) => v.first().map(|&x| x as f64),
                Value::Ascii(_) => Self::get_ascii(exif, tag).and_then(|s| s.parse().ok()),
                _ => None,
            })
            .filter(|v| v.is_finite())
    }

    fn get_exptime(exif: &Exif) -> Option<f64> {
        let field = exif.get_field(Tag::ExposureTime, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(_) => Self::get_ascii(exif, Tag::ExposureTime).and_then(|s| parse_exptime(&s)),
            _ => Self::get_rational(exif, Tag::ExposureTime),
        }
    }
}

/// Normalize an EXIF timestamp to ISO-8601 (`YYYY-MM-DDTHH:MM:SS`).
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Parse an exposure time written as `"30"`, `"0.5"` or `"1/125"`.
pub fn parse_exptime(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Zero means "not recorded" for optics tags.
fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}
