//! Camera geometry resolver: camera model → Bayer channel sampling.
//!
//! The camera file holds one TOML table per camera model (named exactly as
//! the EXIF "Image Model" tag) with `R1`, `G2`, `G3` and `B4` keys, each an
//! `"offset_x,offset_y,stride"` triple. Lookups are cached for the lifetime
//! of the resolver; a changed camera file needs a new process.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CameraError;
use crate::types::Channel;

/// Camera table shipped with skyglow, used when the user has none.
pub const DEFAULT_CAMERA_TABLE: &str = include_str!("../data/cameras.toml");

/// Where one Bayer channel starts in the sensor plane and how it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelGeometry {
    /// First row of the channel
    pub offset_x: usize,
    /// First column of the channel
    pub offset_y: usize,
    /// Step between samples along both axes
    pub stride: usize,
}

impl fmt::Display for ChannelGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.offset_x, self.offset_y, self.stride)
    }
}

/// Sampling geometry of the four Bayer channels of one camera model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraGeometry {
    pub channels: [ChannelGeometry; 4],
}

impl CameraGeometry {
    pub fn channel(&self, channel: Channel) -> ChannelGeometry {
        self.channels[channel.index()]
    }

    /// Channel origins as `(offset_x, offset_y)` points.
    pub fn points(&self) -> [(usize, usize); 4] {
        self.channels.map(|c| (c.offset_x, c.offset_y))
    }

    pub fn strides(&self) -> [usize; 4] {
        self.channels.map(|c| c.stride)
    }
}

enum CameraSource {
    File(PathBuf),
    Inline(String),
}

/// Caching camera geometry resolver.
pub struct CameraCache {
    source: CameraSource,
    cache: HashMap<String, CameraGeometry>,
}

impl CameraCache {
    /// Resolver backed by a camera file.
    ///
    /// When the file does not exist the bundled table is used instead.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source: CameraSource::File(path.into()),
            cache: HashMap::new(),
        }
    }

    /// Resolver backed by an in-memory camera table.
    pub fn from_toml(content: impl Into<String>) -> Self {
        Self {
            source: CameraSource::Inline(content.into()),
            cache: HashMap::new(),
        }
    }

    /// Resolve the channel geometry of `model`.
    ///
    /// The first successful lookup of a model is cached and never refreshed.
    pub fn lookup(&mut self, model: &str) -> Result<CameraGeometry, CameraError> {
        if let Some(geometry) = self.cache.get(model) {
            return Ok(*geometry);
        }

        let table = self.load_table()?;
        let entry = table
            .get(model)
            .and_then(|v| v.as_table())
            .ok_or_else(|| CameraError::Unsupported(model.to_string()))?;

        let mut channels = [ChannelGeometry {
            offset_x: 0,
            offset_y: 0,
            stride: 2,
        }; 4];
        for channel in Channel::ALL {
            let value = entry
                .get(channel.label())
                .and_then(|v| v.as_str())
                .ok_or_else(|| CameraError::InvalidEntry {
                    model: model.to_string(),
                    channel: channel.label().to_string(),
                    value: "<missing>".to_string(),
                })?;
            channels[channel.index()] = parse_triple(model, channel, value)?;
        }

        let geometry = CameraGeometry { channels };
        tracing::debug!("Camera '{}' geometry: {:?}", model, geometry.channels);
        self.cache.insert(model.to_string(), geometry);
        Ok(geometry)
    }

    /// Number of models resolved so far.
    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    fn load_table(&self) -> Result<toml::Table, CameraError> {
        match &self.source {
            CameraSource::Inline(content) => parse_table(content, Path::new("<inline>")),
            CameraSource::File(path) if !path.exists() => {
                tracing::debug!(
                    "No camera file at {}, using the bundled camera table",
                    path.display()
                );
                parse_table(DEFAULT_CAMERA_TABLE, Path::new("<bundled>"))
            }
            CameraSource::File(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| CameraError::Read {
                    path: path.clone(),
                    source,
                })?;
                parse_table(&content, path)
            }
        }
    }
}

fn parse_table(content: &str, path: &Path) -> Result<toml::Table, CameraError> {
    content.parse::<toml::Table>().map_err(|source| CameraError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an `"offset_x,offset_y,stride"` triple.
fn parse_triple(model: &str, channel: Channel, value: &str) -> Result<ChannelGeometry, CameraError> {
    let invalid = || CameraError::InvalidEntry {
        model: model.to_string(),
        channel: channel.label().to_string(),
        value: value.to_string(),
    };

    let fields: Vec<usize> = value
        .split(',')
        .map(|f| f.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    match fields.as_slice() {
        [offset_x, offset_y, stride] if *stride > 0 => Ok(ChannelGeometry {
            offset_x: *offset_x,
            offset_y: *offset_y,
            stride: *stride,
        }),
        _ => Err(invalid()),
    }
}
