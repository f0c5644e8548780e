//! Session synchronizer: reconciles a working directory with the store.
//!
//! Each pass hashes the candidate files, decides which session they belong
//! to, and registers new files / unregisters vanished ones in a single
//! transaction.

use rusqlite::ErrorCode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::pipeline::{FileDiscovery, Hasher};
use crate::store::{images, ImageRef, Store};
use crate::types::{ObserverTags, SessionId};

/// A file whose bytes are identical to an already registered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// Name of the registered image
    pub original: String,
    /// Name of the rejected file
    pub duplicate: String,
}

impl std::fmt::Display for Duplicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is duplicate of {}", self.duplicate, self.original)
    }
}

/// Outcome of one synchronization pass.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub session: SessionId,
    /// The session was minted by this pass
    pub is_new: bool,
    /// Content hash → file path of every candidate in the working directory
    pub files: HashMap<String, PathBuf>,
    pub added: usize,
    pub deleted: usize,
    pub duplicates: Vec<Duplicate>,
}

/// Reconciles working directories with the store.
pub struct Synchronizer {
    discovery: FileDiscovery,
    tags: ObserverTags,
    mint_retry: Duration,
}

impl Synchronizer {
    /// `filter` is the glob applied to file names; `tags` are copied onto
    /// every newly registered image.
    pub fn new(filter: &str, tags: ObserverTags) -> Result<Self> {
        Ok(Self {
            discovery: FileDiscovery::new(filter)?,
            tags,
            mint_retry: Duration::from_secs(1),
        })
    }

    /// Pause before minting another session id when one is already taken.
    pub fn with_mint_retry(mut self, delay: Duration) -> Self {
        self.mint_retry = delay;
        self
    }

    /// Reconcile `work_dir` with the store.
    ///
    /// Fails with [`SyncError::MixingCandidates`] before touching the store
    /// when the directory holds images of several earlier sessions.
    pub fn reconcile(&self, store: &mut Store, work_dir: &Path) -> Result<SyncReport> {
        let discovered = self.discovery.discover(work_dir)?;
        let mut files = HashMap::with_capacity(discovered.len());
        let mut candidates = Vec::with_capacity(discovered.len());
        for file in &discovered {
            let hash = Hasher::content_hash(&file.path).map_err(|e| SyncError::WorkDir {
                path: file.path.clone(),
                message: e.to_string(),
            })?;
            files.entry(hash.clone()).or_insert_with(|| file.path.clone());
            candidates.push((file.name.clone(), hash));
        }
        tracing::debug!("{} candidate files in {}", candidates.len(), work_dir.display());

        let tx = store.transaction()?;
        images::stage_candidates(&tx, candidates.iter().map(|(n, h)| (n.as_str(), h.as_str())))?;

        let sessions = images::candidate_sessions(&tx)?;
        let (session, is_new) = match sessions.len() {
            0 => (self.mint_session(&tx)?, true),
            1 => (sessions[0], false),
            _ => {
                return Err(SyncError::MixingCandidates {
                    work_dir: work_dir.to_path_buf(),
                    sessions,
                }
                .into())
            }
        };

        let to_delete = images::images_to_delete(&tx, session)?;
        for image in &to_delete {
            images::delete_image(&tx, &image.hash)?;
            tracing::info!("Unregistered {} (no longer in {})", image.name, work_dir.display());
        }

        let mut added = 0;
        let mut duplicates = Vec::new();
        for image in images::candidates_to_add(&tx)? {
            match self.register(&tx, &image, session)? {
                None => added += 1,
                Some(duplicate) => {
                    tracing::warn!("{}", duplicate);
                    duplicates.push(duplicate);
                }
            }
        }
        tx.commit()?;

        tracing::info!(
            "Session {} ({}): {} registered, {} unregistered, {} duplicates",
            session,
            if is_new { "new" } else { "existing" },
            added,
            to_delete.len(),
            duplicates.len()
        );

        Ok(SyncReport {
            session,
            is_new,
            files,
            added,
            deleted: to_delete.len(),
            duplicates,
        })
    }

    /// Insert one image; a hash conflict becomes a duplicate notice.
    fn register(
        &self,
        conn: &rusqlite::Connection,
        image: &ImageRef,
        session: SessionId,
    ) -> Result<Option<Duplicate>> {
        match images::insert_image(conn, image, session, &self.tags) {
            Ok(()) => Ok(None),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                let original = images::name_of(conn, &image.hash)?.unwrap_or_default();
                Ok(Some(Duplicate {
                    original,
                    duplicate: image.name.clone(),
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A session id not used by any stored image yet.
    fn mint_session(&self, conn: &rusqlite::Connection) -> Result<SessionId> {
        loop {
            let session = SessionId::now();
            if !images::session_exists(conn, session)? {
                return Ok(session);
            }
            tracing::debug!("Session {} already taken, waiting", session);
            std::thread::sleep(self.mint_retry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkyglowError;

    fn synchronizer() -> Synchronizer {
        Synchronizer::new("*.*", ObserverTags::default()).unwrap()
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    fn image_count(store: &Store) -> i64 {
        store
            .conn()
            .query_row("SELECT COUNT(*) FROM image_t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_new_directory_mints_session() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "IMG_0001.CR2", b"light 1");
        write(dir.path(), "IMG_0002.CR2", b"light 2");
        let mut store = Store::in_memory().unwrap();

        let report = synchronizer().reconcile(&mut store, dir.path()).unwrap();
        assert!(report.is_new);
        assert_eq!(report.added, 2);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.files.len(), 2);
        assert_eq!(image_count(&store), 2);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "IMG_0001.CR2", b"light 1");
        let mut store = Store::in_memory().unwrap();

        let first = synchronizer().reconcile(&mut store, dir.path()).unwrap();
        let second = synchronizer().reconcile(&mut store, dir.path()).unwrap();
        assert_eq!(second.session, first.session);
        assert!(!second.is_new);
        assert_eq!((second.added, second.deleted), (0, 0));
        assert_eq!(image_count(&store), 1);
    }

    #[test]
    fn test_identical_bytes_are_reported_as_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "IMG_0001.CR2", b"same bytes");
        write(dir.path(), "IMG_0001 copy.CR2", b"same bytes");
        let mut store = Store::in_memory().unwrap();

        let report = synchronizer().reconcile(&mut store, dir.path()).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(
            report.duplicates,
            vec![Duplicate {
                original: "IMG_0001 copy.CR2".into(),
                duplicate: "IMG_0001.CR2".into(),
            }]
        );
        assert_eq!(image_count(&store), 1);
    }

    #[test]
    fn test_removed_file_is_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "IMG_0001.CR2", b"light 1");
        write(dir.path(), "IMG_0002.CR2", b"light 2");
        let mut store = Store::in_memory().unwrap();
        let first = synchronizer().reconcile(&mut store, dir.path()).unwrap();

        std::fs::remove_file(dir.path().join("IMG_0002.CR2")).unwrap();
        let second = synchronizer().reconcile(&mut store, dir.path()).unwrap();
        assert_eq!(second.session, first.session);
        assert_eq!(second.deleted, 1);
        assert_eq!(image_count(&store), 1);
    }

    #[test]
    fn test_mixing_sessions_fails_before_mutation() {
        let night1 = tempfile::tempdir().unwrap();
        let night2 = tempfile::tempdir().unwrap();
        write(night1.path(), "a.CR2", b"night one");
        write(night2.path(), "b.CR2", b"night two");

        let mut store = Store::in_memory().unwrap();
        let sync = synchronizer().with_mint_retry(Duration::from_millis(10));
        let s1 = sync.reconcile(&mut store, night1.path()).unwrap();
        let s2 = sync.reconcile(&mut store, night2.path()).unwrap();
        assert_ne!(s1.session, s2.session);

        let mixed = tempfile::tempdir().unwrap();
        write(mixed.path(), "a.CR2", b"night one");
        write(mixed.path(), "b.CR2", b"night two");
        write(mixed.path(), "c.CR2", b"brand new");

        let err = sync.reconcile(&mut store, mixed.path()).unwrap_err();
        assert!(matches!(
            err,
            SkyglowError::Sync(SyncError::MixingCandidates { ref sessions, .. }) if sessions.len() == 2
        ));
        assert_eq!(image_count(&store), 2);
    }

    #[test]
    fn test_missing_work_dir() {
        let mut store = Store::in_memory().unwrap();
        let err = synchronizer()
            .reconcile(&mut store, Path::new("/nonexistent/night"))
            .unwrap_err();
        assert!(matches!(err, SkyglowError::Sync(SyncError::WorkDir { .. })));
    }
}
