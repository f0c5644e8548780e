//! Pipeline orchestration: drives a working directory through
//! REGISTERED → RAW_STATS → DARK_SUBTRACTED and exports the result.
//!
//! ```text
//! sync → stats → classify → master dark → (export)
//! ```
//!
//! Every stage is idempotent, so an interrupted run is resumed by running
//! it again.

mod stages;

pub use stages::{DarkOutcome, StatsOutcome};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::CameraCache;
use crate::config::Config;
use crate::error::Result;
use crate::export::{CsvExporter, ExportSummary};
use crate::pipeline::{Classifier, FileDiscovery, FrameReader, RawFileReader};
use crate::session::{Duplicate, Synchronizer};
use crate::store::{images, master_dark, MasterDark, SessionSummary, Store};
use crate::types::SessionId;

/// Receives progress of the stats stage.
pub trait ProgressReporter {
    fn start(&self, _total: usize) {}
    fn advance(&self, _name: &str) {}
    fn finish(&self) {}
}

/// Reporter that ignores progress.
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Options for a reduction run.
#[derive(Debug, Clone)]
pub struct ReduceOptions {
    /// Export CSV files even when nothing changed
    pub force_csv: bool,
    /// Delay between sessions, keeping minted session ids distinct
    pub pause: Duration,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            force_csv: false,
            pause: Duration::from_secs(1),
        }
    }
}

/// Summary of one working directory run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub work_dir: PathBuf,
    pub session: SessionId,
    pub is_new: bool,
    pub added: usize,
    pub deleted: usize,
    pub duplicates: Vec<Duplicate>,
    pub stats: StatsOutcome,
    pub classified: usize,
    pub master_dark: Option<MasterDark>,
    pub subtracted: usize,
    pub export: Option<ExportSummary>,
    pub summary: SessionSummary,
}

/// The reduction pipeline over one store.
pub struct Reducer {
    store: Store,
    config: Config,
    cameras: CameraCache,
    reader: Box<dyn FrameReader>,
    progress: Box<dyn ProgressReporter>,
    options: ReduceOptions,
}

impl Reducer {
    /// Reducer reading RAW files from disk with the configured camera file.
    pub fn new(store: Store, config: Config) -> Self {
        let cameras = CameraCache::new(config.camera_file());
        Self {
            store,
            config,
            cameras,
            reader: Box::new(RawFileReader),
            progress: Box::new(NoProgress),
            options: ReduceOptions::default(),
        }
    }

    pub fn with_reader(mut self, reader: Box<dyn FrameReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_cameras(mut self, cameras: CameraCache) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_options(mut self, options: ReduceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Reduce one working directory with the global observer settings.
    pub fn run(&mut self, work_dir: &Path) -> Result<RunReport> {
        let config = self.config.clone();
        self.run_with(work_dir, &config)
    }

    /// Reduce every sub-directory of `root` as its own session.
    ///
    /// A sub-directory named like an observer profile is tagged with that
    /// profile.
    pub fn run_all(&mut self, root: &Path) -> Result<Vec<RunReport>> {
        let dirs = FileDiscovery::subdirectories(root)?;
        let mut reports = Vec::with_capacity(dirs.len());

        for (i, dir) in dirs.iter().enumerate() {
            if i > 0 {
                std::thread::sleep(self.options.pause);
            }
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let config = match self.config.load_observer_profile(name)? {
                Some(profile) => self.config.with_observer_profile(&profile),
                None => self.config.clone(),
            };
            tracing::info!("Reducing {}", dir.display());
            reports.push(self.run_with(dir, &config)?);
        }
        Ok(reports)
    }

    fn run_with(&mut self, work_dir: &Path, config: &Config) -> Result<RunReport> {
        let sync = Synchronizer::new(&config.processing.filter, config.observer.tags())?
            .with_mint_retry(self.options.pause)
            .reconcile(&mut self.store, work_dir)?;
        let session = sync.session;

        let tx = self.store.transaction()?;
        let stats = stages::compute_stats(
            &tx,
            session,
            &sync.files,
            self.reader.as_ref(),
            &mut self.cameras,
            config,
            self.progress.as_ref(),
        )?;
        tx.commit()?;

        let tx = self.store.transaction()?;
        let classified =
            stages::classify(&tx, session, &Classifier::new(config.processing.detect_bias))?;
        tx.commit()?;

        let tx = self.store.transaction()?;
        let dark = stages::subtract_dark(&tx, session)?;
        tx.commit()?;

        let export = if sync.deleted > 0 || stats.computed > 0 || self.options.force_csv {
            let exporter = CsvExporter::new(config.csv_dir(), &config.output.global_csv);
            Some(exporter.export(self.store.conn(), session)?)
        } else {
            tracing::info!("Session {} unchanged, CSV export skipped", session);
            None
        };

        let summary = images::session_summaries(self.store.conn(), Some(session))?
            .into_iter()
            .next()
            .unwrap_or(SessionSummary {
                session,
                ..Default::default()
            });

        Ok(RunReport {
            work_dir: work_dir.to_path_buf(),
            session,
            is_new: sync.is_new,
            added: sync.added,
            deleted: sync.deleted,
            duplicates: sync.duplicates,
            stats,
            classified,
            master_dark: dark.master,
            subtracted: dark.subtracted,
            export,
            summary,
        })
    }

    /// Send every processed image of `session` back to REGISTERED and drop
    /// its master dark. Returns the number of images reset.
    pub fn reset(&mut self, session: SessionId) -> Result<usize> {
        let tx = self.store.transaction()?;
        let reset = images::reset_session(&tx, session)?;
        master_dark::delete(&tx, session)?;
        tx.commit()?;
        tracing::info!("Reset {} images of session {}", reset, session);
        Ok(reset)
    }

    /// Most recent session in the store.
    pub fn latest_session(&self) -> Result<Option<SessionId>> {
        Ok(images::latest_session(self.store.conn())?)
    }
}
