//! The reduction stages. Each runs inside one transaction owned by the caller.

use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::camera::{CameraCache, CameraGeometry};
use crate::config::{Config, RoiSpec};
use crate::error::{PipelineResult, Result};
use crate::pipeline::{
    center_region, channel_stats, corner_region, slice_channels, Classifier, FrameReader,
};
use crate::store::{images, master_dark, BiasCorner, ImageStats, MasterDark};
use crate::types::{ChannelStats, ExifMetadata, Region, SessionId};

use super::ProgressReporter;

/// Counters of the stats stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsOutcome {
    /// Images advanced to RAW_STATS
    pub computed: usize,
    /// Images removed because their metadata is unreadable
    pub unregistered: usize,
    /// Images left at REGISTERED after a decode failure
    pub skipped: usize,
}

/// Outcome of the master dark stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DarkOutcome {
    pub master: Option<MasterDark>,
    /// LIGHT images carrying the master dark
    pub subtracted: usize,
}

/// Compute raw statistics for every image of `session` below RAW_STATS.
///
/// Per-image failures are logged and isolated. A camera configuration
/// error aborts the stage; the caller's transaction then rolls back.
pub fn compute_stats(
    conn: &Connection,
    session: SessionId,
    files: &HashMap<String, PathBuf>,
    reader: &dyn FrameReader,
    cameras: &mut CameraCache,
    config: &Config,
    progress: &dyn ProgressReporter,
) -> Result<StatsOutcome> {
    let pending = images::pending_stats(conn, session)?;
    let mut outcome = StatsOutcome::default();
    progress.start(pending.len());

    for image in &pending {
        progress.advance(&image.name);
        let Some(path) = files.get(&image.hash) else {
            tracing::warn!("{}: file not found in working directory, skipping", image.name);
            outcome.skipped += 1;
            continue;
        };

        let mut exif = match reader.metadata(path) {
            Ok(exif) => exif,
            Err(e) if e.unregisters_image() => {
                tracing::warn!("{}: {}. Unregistering image", image.name, e);
                images::delete_image(conn, &image.hash)?;
                outcome.unregistered += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("{}: {}", image.name, e);
                outcome.skipped += 1;
                continue;
            }
        };

        let geometry = cameras.lookup(&exif.model)?;
        apply_optics_fallbacks(&mut exif, config);

        match measure(reader, path, &geometry, config) {
            Ok((roi, signal, bias)) => {
                tracing::debug!(
                    "{}: {} {} R1={:.1} G2={:.1} G3={:.1} B4={:.1}",
                    image.name,
                    exif.model,
                    roi,
                    signal[0].mean,
                    signal[1].mean,
                    signal[2].mean,
                    signal[3].mean
                );
                let stats = ImageStats {
                    exif,
                    roi,
                    signal,
                    bias,
                };
                images::store_stats(conn, &image.hash, &stats)?;
                outcome.computed += 1;
            }
            Err(e) => {
                tracing::warn!("{}: {}", image.name, e);
                outcome.skipped += 1;
            }
        }
    }

    progress.finish();
    tracing::info!(
        "Stats: {} computed, {} unregistered, {} skipped",
        outcome.computed,
        outcome.unregistered,
        outcome.skipped
    );
    Ok(outcome)
}

/// Decode one frame and measure its statistics window and bias corner.
fn measure(
    reader: &dyn FrameReader,
    path: &Path,
    geometry: &CameraGeometry,
    config: &Config,
) -> PipelineResult<(Region, [ChannelStats; 4], Option<BiasCorner>)> {
    let plane = reader.raw_plane(path)?;
    let planes = slice_channels(&plane, geometry, path)?;
    let (rows, cols) = planes[0].dim();

    let roi = match config.image.roi() {
        RoiSpec::Fixed(region) => region,
        RoiSpec::Centered { width, height } => center_region(rows, cols, width, height),
    };
    let signal = channel_stats(&planes, &roi)?;

    let bias = if config.calibration.bias_corner {
        let region = corner_region(
            rows,
            cols,
            config.calibration.corner_rows,
            config.calibration.corner_cols,
        );
        Some(BiasCorner {
            region,
            stats: channel_stats(&planes, &region)?,
        })
    } else {
        None
    };

    Ok((roi, signal, bias))
}

fn apply_optics_fallbacks(exif: &mut ExifMetadata, config: &Config) {
    if exif.focal_length.is_none() {
        exif.focal_length = config.image.focal_length;
    }
    if exif.f_number.is_none() {
        exif.f_number = config.image.f_number;
    }
}

/// Classify every UNKNOWN image of `session` from its file name.
pub fn classify(conn: &Connection, session: SessionId, classifier: &Classifier) -> Result<usize> {
    let pending = images::unclassified(conn, session)?;
    for image in &pending {
        let image_type = classifier.classify(&image.name);
        tracing::debug!("{}: {}", image.name, image_type);
        images::set_type(conn, &image.hash, image_type)?;
    }
    tracing::info!("Classified {} images", pending.len());
    Ok(pending.len())
}

/// Rebuild the session's master dark and apply it to its LIGHT images.
pub fn subtract_dark(conn: &Connection, session: SessionId) -> Result<DarkOutcome> {
    let Some(dark) = master_dark::aggregate(conn, session)? else {
        master_dark::delete(conn, session)?;
        let cleared = images::clear_master_dark(conn, session)?;
        if cleared > 0 {
            tracing::warn!(
                "Dark frames of session {} are gone, {} light images back to RAW STATS",
                session,
                cleared
            );
        }
        tracing::info!("No dark frames in session {}, skipping dark subtraction", session);
        return Ok(DarkOutcome::default());
    };

    if dark.mixed_exposures() {
        tracing::warn!(
            "Dark frames of session {} mix exposure times ({:?} to {:?} s)",
            session,
            dark.min_exptime,
            dark.max_exptime
        );
    }
    master_dark::replace(conn, &dark)?;
    let subtracted = images::apply_master_dark(conn, &dark)?;
    tracing::info!(
        "Master dark from {} frames applied to {} light images",
        dark.n,
        subtracted
    );

    Ok(DarkOutcome {
        master: Some(dark),
        subtracted,
    })
}
