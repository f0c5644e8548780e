//! The `skyglow reduce` command.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use skyglow_core::{
    NoProgress, ProgressReporter, ReduceOptions, Reducer, RunReport, SkyglowError, Store,
    SyncError,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Arguments for the `reduce` command.
#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Working directory holding the session's RAW frames
    #[arg(short, long)]
    pub work_dir: PathBuf,

    /// Glob filter for file names (overrides processing.filter)
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Reduce each sub-directory of the working directory as its own session
    #[arg(long)]
    pub multiple: bool,

    /// Export CSV files even when nothing changed
    #[arg(long)]
    pub csv: bool,

    /// Size of the centered statistics window as WIDTH,HEIGHT
    #[arg(long, value_parser = parse_roi)]
    pub roi: Option<(usize, usize)>,
}

/// Execute the reduce command.
pub fn execute(args: ReduceArgs, config_path: Option<&Path>, quiet: bool) -> anyhow::Result<()> {
    if !args.work_dir.is_dir() {
        anyhow::bail!(
            "Working directory does not exist: {:?}\n\n  Hint: Check the path and try again.",
            args.work_dir
        );
    }

    let mut config = super::load_config(config_path)?;
    if let Some(filter) = args.filter {
        config.processing.filter = filter;
    }
    if let Some((width, height)) = args.roi {
        config.image.width = width;
        config.image.height = height;
        config.image.region = None;
    }
    config.validate()?;

    let store = Store::open(&config.database_path())?;
    let progress: Box<dyn ProgressReporter> = if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(BarProgress::default())
    };
    let mut reducer = Reducer::new(store, config)
        .with_progress(progress)
        .with_options(ReduceOptions {
            force_csv: args.csv,
            ..Default::default()
        });

    let reports = if args.multiple {
        reducer.run_all(&args.work_dir)
    } else {
        reducer.run(&args.work_dir).map(|report| vec![report])
    }
    .map_err(with_hint)?;

    for report in &reports {
        print_summary(report);
    }
    Ok(())
}

/// Attach operator hints to structural failures.
fn with_hint(err: SkyglowError) -> anyhow::Error {
    match &err {
        SkyglowError::Sync(SyncError::MixingCandidates { .. }) => anyhow::anyhow!(
            "{err}\n\n  Hint: Move the frames of each night to their own directory, \
             or use `skyglow reset` on the sessions involved."
        ),
        SkyglowError::Camera(_) => anyhow::anyhow!(
            "{err}\n\n  Hint: Run `skyglow camera init` to write the bundled camera table, \
             then add a table for your camera."
        ),
        _ => err.into(),
    }
}

fn parse_roi(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(',')
        .ok_or_else(|| format!("'{s}' must look like WIDTH,HEIGHT"))?;
    let w: usize = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let h: usize = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    if w == 0 || h == 0 {
        return Err("WIDTH and HEIGHT must be > 0".to_string());
    }
    Ok((w, h))
}

/// Progress bar over the stats stage, one bar per session.
#[derive(Default)]
struct BarProgress {
    bar: RefCell<Option<ProgressBar>>,
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: usize) {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("##-"));
        }
        pb.set_message("starting...");
        *self.bar.borrow_mut() = Some(pb);
    }

    fn advance(&self, name: &str) {
        if let Some(pb) = self.bar.borrow().as_ref() {
            pb.set_message(name.to_string());
            pb.inc(1);
        }
    }

    fn finish(&self) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}

/// Print a formatted summary table for one session.
fn print_summary(report: &RunReport) {
    let s = &report.summary;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("    Session {}{}", report.session, if report.is_new { " (new)" } else { "" });
    eprintln!("  ====================================");
    eprintln!("    Directory:    {}", report.work_dir.display());
    eprintln!("    Registered:   {:>8}", report.added);
    if report.deleted > 0 {
        eprintln!("    Unregistered: {:>8}", report.deleted);
    }
    eprintln!("    Measured:     {:>8}", report.stats.computed);
    if report.stats.unregistered > 0 {
        eprintln!("    Bad metadata: {:>8}", report.stats.unregistered);
    }
    if report.stats.skipped > 0 {
        eprintln!("    Failed:       {:>8}", report.stats.skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Images:       {:>8}", s.images);
    eprintln!("    Lights:       {:>8}", s.light);
    eprintln!("    Darks:        {:>8}", s.dark);
    eprintln!(
        "    States:       {} registered / {} raw stats / {} dark subtracted",
        s.registered, s.raw_stats, s.dark_subtracted
    );
    match &report.master_dark {
        Some(dark) => eprintln!("    Master dark:  {:>8} frames", dark.n),
        None => eprintln!("    Master dark:      none"),
    }
    if let Some(export) = &report.export {
        eprintln!("  ------------------------------------");
        eprintln!("    CSV:          {} ({} rows)", export.session_file.display(), export.session_rows);
        eprintln!("    Global CSV:   {} ({} rows)", export.global_file.display(), export.global_rows);
    }
    if !report.duplicates.is_empty() {
        eprintln!("  ------------------------------------");
        for duplicate in &report.duplicates {
            eprintln!("    {duplicate}");
        }
    }
    eprintln!("  ====================================");
}
