//! Skyglow Core - sky brightness reduction of camera RAW frames.
//!
//! Skyglow turns a folder of night-sky RAW frames into per-channel signal
//! statistics, tracks each frame's progress in a local SQLite store, and
//! exports dark-subtracted results as `;`-delimited CSV.
//!
//! # Architecture
//!
//! Every working directory is one observing session, reduced as an
//! idempotent state machine over the store:
//!
//! ```text
//! Directory → Sync → Stats (EXIF + Bayer ROI) → Classify → Master dark → CSV
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use skyglow_core::{Config, Reducer, Store};
//!
//! fn main() -> skyglow_core::Result<()> {
//!     let config = Config::load()?;
//!     let store = Store::open(&config.database_path())?;
//!     let mut reducer = Reducer::new(store, config);
//!
//!     let report = reducer.run("./2020-01-01".as_ref())?;
//!     println!("Session {}: {} frames", report.session, report.summary.images);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod camera;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reduce;
pub mod session;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use camera::{CameraCache, CameraGeometry, ChannelGeometry, DEFAULT_CAMERA_TABLE};
pub use config::Config;
pub use error::{
    CameraError, ConfigError, PipelineError, PipelineResult, Result, SkyglowError, SyncError,
};
pub use export::{CsvExporter, CsvRow, CsvWriter, ExportSummary};
pub use pipeline::{FrameReader, RawFileReader};
pub use reduce::{NoProgress, ProgressReporter, ReduceOptions, Reducer, RunReport};
pub use session::{Duplicate, SyncReport, Synchronizer};
pub use store::{MasterDark, SessionSummary, Store};
pub use types::{
    Channel, ChannelStats, ExifMetadata, ImageType, ObserverTags, ProcessingState, Region,
    SessionId,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
