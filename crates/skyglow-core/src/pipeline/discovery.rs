//! Working directory discovery.
//!
//! Only regular files directly inside the working directory take part in a
//! session; sub-directories are left alone (they are separate sessions in
//! multi-directory mode).

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::SyncError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Finds candidate frames in a working directory.
pub struct FileDiscovery {
    filter: Pattern,
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Base name, as stored in the database
    pub name: String,
}

impl FileDiscovery {
    /// Create a discovery instance for a glob filter such as `*.CR2`.
    pub fn new(filter: &str) -> Result<Self, SyncError> {
        let filter = Pattern::new(filter).map_err(|e| SyncError::Filter {
            filter: filter.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { filter })
    }

    /// List the matching regular files directly inside `dir`, sorted by name.
    pub fn discover(&self, dir: &Path) -> Result<Vec<DiscoveredFile>, SyncError> {
        if !dir.is_dir() {
            return Err(SyncError::WorkDir {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| SyncError::WorkDir {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                tracing::warn!("Skipping non UTF-8 file name: {:?}", entry.path());
                continue;
            };
            if !self.matches(name) {
                continue;
            }
            files.push(DiscoveredFile {
                path: entry.path().to_path_buf(),
                name: name.to_string(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Whether a file name passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        self.filter.matches_with(name, MATCH_OPTIONS)
    }

    /// Immediate sub-directories of `root`, sorted by name.
    pub fn subdirectories(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| SyncError::WorkDir {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
