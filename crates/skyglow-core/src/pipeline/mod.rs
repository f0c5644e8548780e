//! Per-image reduction components.
//!
//! - **discovery**: Find candidate frames in a working directory
//! - **hash**: Content hashes identifying each frame
//! - **metadata**: EXIF extraction
//! - **decode**: RAW sensor plane decoding and Bayer channel slicing
//! - **reader**: The `FrameReader` seam combining metadata and decoding
//! - **stats**: Region statistics
//! - **classify**: LIGHT/DARK classification from file names

pub mod classify;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod metadata;
pub mod reader;
pub mod stats;

// Re-exports for convenient access
pub use classify::Classifier;
pub use decode::{slice_channels, ChannelPlanes, RawDecoder, SensorPlane};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use hash::Hasher;
pub use metadata::MetadataExtractor;
pub use reader::{FrameReader, RawFileReader};
pub use stats::{center_region, channel_stats, corner_region, region_stats};
