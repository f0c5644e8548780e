//! Persistent SQLite store of images, sessions and master darks.
//!
//! Stage code works on a `rusqlite::Transaction` and calls the free
//! functions of [`images`] and [`master_dark`], which take any
//! `&Connection` (a transaction derefs to one).

pub mod images;
pub mod master_dark;
pub mod schema;

pub use images::{BiasCorner, ImageRef, ImageStats, LightRecord, SessionSummary};
pub use master_dark::MasterDark;

use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Handle to the skyglow database.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!("Opened database {}", path.display());
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let tx = conn.transaction()?;
        schema::migrate(&tx)?;
        tx.commit()?;
        Ok(Self { conn, path })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction; dropping it without `commit()` rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelStats, ExifMetadata, ImageType, ObserverTags, ProcessingState, Region, SessionId};

    const SESSION: SessionId = SessionId(20200101220000);

    fn tags() -> ObserverTags {
        ObserverTags {
            observer: "Jane Roe".into(),
            organization: None,
            email: Some("jane@example.org".into()),
            location: "Madrid".into(),
        }
    }

    fn image(name: &str) -> ImageRef {
        ImageRef {
            hash: format!("hash-{name}"),
            name: name.to_string(),
        }
    }

    fn stats(mean: f64, variance: f64, exptime: f64) -> ImageStats {
        ImageStats {
            exif: ExifMetadata {
                tstamp: "2020-01-01T22:00:00".into(),
                model: "Canon EOS 550D".into(),
                iso: Some(800),
                exptime: Some(exptime),
                focal_length: None,
                f_number: None,
            },
            roi: Region::new(0, 2, 0, 2),
            signal: [ChannelStats { mean, variance }; 4],
            bias: None,
        }
    }

    /// Stats with a different mean and variance on every channel.
    fn per_channel(means: [f64; 4], variances: [f64; 4], exptime: f64) -> ImageStats {
        let mut image = stats(0.0, 0.0, exptime);
        for i in 0..4 {
            image.signal[i] = ChannelStats {
                mean: means[i],
                variance: variances[i],
            };
        }
        image
    }

    fn register(store: &Store, names: &[&str]) {
        for name in names {
            images::insert_image(store.conn(), &image(name), SESSION, &tags()).unwrap();
        }
    }

    fn state_of(store: &Store, name: &str) -> (ImageType, ProcessingState) {
        store
            .conn()
            .query_row(
                "SELECT type, state FROM image_t WHERE name = ?1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap()
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("skyglow.db");
        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_duplicate_hash_is_a_constraint_violation() {
        let store = Store::in_memory().unwrap();
        register(&store, &["a.CR2"]);
        let err = images::insert_image(store.conn(), &image("a.CR2"), SESSION, &tags()).unwrap_err();
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn test_staging_diff() {
        let store = Store::in_memory().unwrap();
        register(&store, &["a.CR2", "b.CR2"]);

        images::stage_candidates(store.conn(), [("b.CR2", "hash-b.CR2"), ("c.CR2", "hash-c.CR2")])
            .unwrap();
        assert_eq!(images::candidate_sessions(store.conn()).unwrap(), vec![SESSION]);
        assert_eq!(images::candidates_to_add(store.conn()).unwrap(), vec![image("c.CR2")]);
        assert_eq!(
            images::images_to_delete(store.conn(), SESSION).unwrap(),
            vec![image("a.CR2")]
        );
    }

    #[test]
    fn test_stats_advance_state() {
        let store = Store::in_memory().unwrap();
        register(&store, &["a.CR2"]);
        assert_eq!(images::pending_stats(store.conn(), SESSION).unwrap().len(), 1);

        images::store_stats(store.conn(), "hash-a.CR2", &stats(100.0, 4.0, 30.0)).unwrap();
        assert!(images::pending_stats(store.conn(), SESSION).unwrap().is_empty());
        assert_eq!(
            state_of(&store, "a.CR2"),
            (ImageType::Unknown, ProcessingState::RawStats)
        );
    }

    #[test]
    fn test_master_dark_aggregate_and_apply() {
        let store = Store::in_memory().unwrap();
        register(&store, &["dark1.CR2", "dark2.CR2", "dark3.CR2", "light.CR2"]);
        let darks = [
            ("dark1.CR2", [10.0, 11.0, 12.0, 13.0], [1.0, 2.0, 3.0, 4.0], 45.0),
            ("dark2.CR2", [20.0, 22.0, 24.0, 26.0], [2.0, 4.0, 6.0, 8.0], 30.0),
            ("dark3.CR2", [30.0, 33.0, 36.0, 39.0], [6.0, 9.0, 12.0, 15.0], 60.0),
        ];
        for (name, means, variances, exptime) in darks {
            let hash = format!("hash-{name}");
            images::store_stats(store.conn(), &hash, &per_channel(means, variances, exptime)).unwrap();
            images::set_type(store.conn(), &hash, ImageType::Dark).unwrap();
        }
        images::store_stats(store.conn(), "hash-light.CR2", &stats(500.0, 50.0, 30.0)).unwrap();
        images::set_type(store.conn(), "hash-light.CR2", ImageType::Light).unwrap();

        let dark = master_dark::aggregate(store.conn(), SESSION).unwrap().unwrap();
        assert_eq!(dark.n, 3);
        let expected_means = [20.0, 22.0, 24.0, 26.0];
        let expected_variances = [3.0, 5.0, 7.0, 9.0];
        for i in 0..4 {
            assert!((dark.stats[i].mean - expected_means[i]).abs() < 1e-9, "mean {i}");
            assert!(
                (dark.stats[i].variance - expected_variances[i]).abs() < 1e-9,
                "variance {i}"
            );
        }
        assert_eq!(dark.min_exptime, Some(30.0));
        assert_eq!(dark.max_exptime, Some(60.0));
        assert!(dark.mixed_exposures());

        master_dark::replace(store.conn(), &dark).unwrap();
        master_dark::replace(store.conn(), &dark).unwrap();
        assert_eq!(master_dark::get(store.conn(), SESSION).unwrap(), Some(dark.clone()));

        assert_eq!(images::apply_master_dark(store.conn(), &dark).unwrap(), 1);
        assert_eq!(
            state_of(&store, "light.CR2"),
            (ImageType::Light, ProcessingState::DarkSubtracted)
        );

        let lights = images::dark_subtracted_lights(store.conn(), Some(SESSION)).unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].raw[0].mean, 500.0);
        for i in 0..4 {
            assert!((lights[0].dark[i].mean - expected_means[i]).abs() < 1e-9);
            assert!((lights[0].dark[i].variance - expected_variances[i]).abs() < 1e-9);
        }
        assert_eq!(lights[0].tags, tags());
    }

    #[test]
    fn test_clear_master_dark() {
        let store = Store::in_memory().unwrap();
        register(&store, &["dark.CR2", "light.CR2"]);
        images::store_stats(store.conn(), "hash-dark.CR2", &stats(2048.0, 4.0, 30.0)).unwrap();
        images::set_type(store.conn(), "hash-dark.CR2", ImageType::Dark).unwrap();
        images::store_stats(store.conn(), "hash-light.CR2", &stats(2100.0, 9.0, 30.0)).unwrap();
        images::set_type(store.conn(), "hash-light.CR2", ImageType::Light).unwrap();
        let dark = master_dark::aggregate(store.conn(), SESSION).unwrap().unwrap();
        images::apply_master_dark(store.conn(), &dark).unwrap();

        assert_eq!(images::clear_master_dark(store.conn(), SESSION).unwrap(), 1);
        assert_eq!(
            state_of(&store, "light.CR2"),
            (ImageType::Light, ProcessingState::RawStats)
        );
        assert_eq!(
            state_of(&store, "dark.CR2"),
            (ImageType::Dark, ProcessingState::RawStats)
        );
        let dark_variance: Option<f64> = store
            .conn()
            .query_row(
                "SELECT vari_dark_B4 FROM image_t WHERE name = 'light.CR2'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dark_variance, None);
        assert!(images::dark_subtracted_lights(store.conn(), None).unwrap().is_empty());
        assert_eq!(images::clear_master_dark(store.conn(), SESSION).unwrap(), 0);
    }

    #[test]
    fn test_aggregate_without_darks() {
        let store = Store::in_memory().unwrap();
        register(&store, &["light.CR2"]);
        assert_eq!(master_dark::aggregate(store.conn(), SESSION).unwrap(), None);
    }

    #[test]
    fn test_reset_and_summaries() {
        let store = Store::in_memory().unwrap();
        register(&store, &["a.CR2", "b.CR2"]);
        images::store_stats(store.conn(), "hash-a.CR2", &stats(1.0, 1.0, 1.0)).unwrap();
        images::set_type(store.conn(), "hash-a.CR2", ImageType::Light).unwrap();

        let summary = images::session_summaries(store.conn(), None).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].light, 1);
        assert_eq!(summary[0].raw_stats, 1);
        assert_eq!(summary[0].registered, 1);

        assert_eq!(images::reset_session(store.conn(), SESSION).unwrap(), 1);
        assert_eq!(
            state_of(&store, "a.CR2"),
            (ImageType::Unknown, ProcessingState::Registered)
        );
        assert_eq!(images::latest_session(store.conn()).unwrap(), Some(SESSION));
        assert!(images::session_exists(store.conn(), SESSION).unwrap());
        assert!(!images::session_exists(store.conn(), SessionId(1)).unwrap());
    }
}
