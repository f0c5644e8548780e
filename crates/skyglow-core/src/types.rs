//! Core data types shared by the reduction stages and the store.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four interleaved Bayer sub-arrays of a RAW sensor plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    R1,
    G2,
    G3,
    B4,
}

impl Channel {
    /// All channels in storage order.
    pub const ALL: [Channel; 4] = [Channel::R1, Channel::G2, Channel::G3, Channel::B4];

    /// Column suffix and camera-file key for this channel.
    pub fn label(self) -> &'static str {
        match self {
            Channel::R1 => "R1",
            Channel::G2 => "G2",
            Channel::G3 => "G3",
            Channel::B4 => "B4",
        }
    }

    /// Index into per-channel arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mean and population variance of a pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub variance: f64,
}

/// Frame classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageType {
    Light,
    Dark,
    /// Opt-in bucket; recorded but never aggregated nor exported
    Bias,
    #[default]
    Unknown,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Light => "LIGHT",
            ImageType::Dark => "DARK",
            ImageType::Bias => "BIAS",
            ImageType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIGHT" => Ok(ImageType::Light),
            "DARK" => Ok(ImageType::Dark),
            "BIAS" => Ok(ImageType::Bias),
            "UNKNOWN" => Ok(ImageType::Unknown),
            other => Err(format!("unknown image type '{other}'")),
        }
    }
}

impl ToSql for ImageType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ImageType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Ordered progress marker of an image through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ProcessingState {
    #[default]
    Registered = 0,
    RawStats = 1,
    DarkSubtracted = 2,
}

impl ProcessingState {
    pub fn label(self) -> &'static str {
        match self {
            ProcessingState::Registered => "REGISTERED",
            ProcessingState::RawStats => "RAW STATS",
            ProcessingState::DarkSubtracted => "DARK SUBTRACTED",
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ProcessingState::Registered),
            1 => Some(ProcessingState::RawStats),
            2 => Some(ProcessingState::DarkSubtracted),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ToSql for ProcessingState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ProcessingState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        ProcessingState::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// Session identifier: the UTC time it was minted, as `YYYYMMDDHHMMSS`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Session identifier for the current UTC second.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let stamp = at.format("%Y%m%d%H%M%S").to_string();
        // Fourteen ASCII digits always fit an i64.
        Self(stamp.parse().unwrap_or_default())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SessionId)
    }
}

impl ToSql for SessionId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for SessionId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(SessionId)
    }
}

/// Rectangular pixel window: columns `x1..x2`, rows `y1..y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x1: usize,
    pub x2: usize,
    pub y1: usize,
    pub y2: usize,
}

impl Region {
    /// Build a region from two corners in any order.
    pub fn new(x1: usize, x2: usize, y1: usize, y2: usize) -> Self {
        Self {
            x1: x1.min(x2),
            x2: x1.max(x2),
            y1: y1.min(y2),
            y2: y1.max(y2),
        }
    }

    /// A `width x height` window anchored at the origin.
    pub fn sized(width: usize, height: usize) -> Self {
        Self::new(0, width, 0, height)
    }

    pub fn width(&self) -> usize {
        self.x2 - self.x1
    }

    pub fn height(&self) -> usize {
        self.y2 - self.y1
    }

    /// The same window moved by `(dx, dy)`.
    pub fn shifted(&self, dx: usize, dy: usize) -> Self {
        Self {
            x1: self.x1 + dx,
            x2: self.x2 + dx,
            y1: self.y1 + dy,
            y2: self.y2 + dy,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{},{}:{}]", self.x1, self.x2, self.y1, self.y2)
    }
}

impl FromStr for Region {
    type Err = String;

    /// Parses the `[x1:x2,y1:y2]` form produced by `Display`; brackets are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
        let (xs, ys) = inner
            .split_once(',')
            .ok_or_else(|| format!("region '{s}' must look like [x1:x2,y1:y2]"))?;
        let bounds = |part: &str| -> Result<(usize, usize), String> {
            let (a, b) = part
                .split_once(':')
                .ok_or_else(|| format!("region '{s}' must look like [x1:x2,y1:y2]"))?;
            let a = a.trim().parse().map_err(|_| format!("bad bound '{a}' in '{s}'"))?;
            let b = b.trim().parse().map_err(|_| format!("bad bound '{b}' in '{s}'"))?;
            Ok((a, b))
        };
        let (x1, x2) = bounds(xs)?;
        let (y1, y2) = bounds(ys)?;
        Ok(Region::new(x1, x2, y1, y2))
    }
}

/// EXIF-derived fields stored with each image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExifMetadata {
    /// Capture time, ISO-8601 (`YYYY-MM-DDTHH:MM:SS`)
    pub tstamp: String,

    /// Camera model as reported by the "Image Model" tag
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,

    /// Exposure time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exptime: Option<f64>,

    /// Focal length in mm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
}

/// Observer tags copied onto every image registered in a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverTags {
    pub observer: String,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_ordering() {
        assert!(ProcessingState::Registered < ProcessingState::RawStats);
        assert!(ProcessingState::RawStats < ProcessingState::DarkSubtracted);
        assert_eq!(ProcessingState::from_code(2), Some(ProcessingState::DarkSubtracted));
        assert_eq!(ProcessingState::from_code(7), None);
    }

    #[test]
    fn test_image_type_parse() {
        assert_eq!("DARK".parse::<ImageType>(), Ok(ImageType::Dark));
        assert_eq!("LIGHT".parse::<ImageType>(), Ok(ImageType::Light));
        assert!("dark".parse::<ImageType>().is_err());
        assert_eq!(ImageType::default(), ImageType::Unknown);
    }

    #[test]
    fn test_session_id_from_datetime() {
        let at = Utc.with_ymd_and_hms(2020, 3, 7, 21, 5, 9).unwrap();
        assert_eq!(SessionId::from_datetime(at), SessionId(20200307210509));
        assert_eq!("20200307210509".parse::<SessionId>().unwrap().0, 20200307210509);
    }

    #[test]
    fn test_region_normalizes_corners() {
        let r = Region::new(10, 2, 8, 4);
        assert_eq!(r, Region { x1: 2, x2: 10, y1: 4, y2: 8 });
        assert_eq!(r.width(), 8);
        assert_eq!(r.height(), 4);
    }

    #[test]
    fn test_region_display_parse() {
        let r = Region::sized(500, 400).shifted(100, 50);
        assert_eq!(r.to_string(), "[100:600,50:450]");
        assert_eq!("[100:600,50:450]".parse::<Region>().unwrap(), r);
        assert_eq!("100:600, 50:450".parse::<Region>().unwrap(), r);
        assert!("100-600".parse::<Region>().is_err());
    }

    #[test]
    fn test_channel_labels() {
        let labels: Vec<_> = Channel::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["R1", "G2", "G3", "B4"]);
        assert_eq!(Channel::B4.index(), 3);
    }
}
