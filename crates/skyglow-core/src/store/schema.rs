//! Store schema and its versioned migrations.
//!
//! The schema version lives in `PRAGMA user_version`; each migration runs
//! once, in order, inside the caller's transaction.

use rusqlite::Connection;

use crate::types::{Channel, ProcessingState};

/// Schema version written by the latest migration.
pub const SCHEMA_VERSION: i64 = 2;

const V1_BASE: &str = "
CREATE TABLE IF NOT EXISTS state_t (
    state           INTEGER PRIMARY KEY,
    label           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS image_t (
    hash            TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    session         INTEGER NOT NULL,
    type            TEXT NOT NULL DEFAULT 'UNKNOWN',
    state           INTEGER NOT NULL DEFAULT 0 REFERENCES state_t(state),
    roi             TEXT,
    tstamp          TEXT,
    model           TEXT,
    iso             INTEGER,
    exptime         REAL,
    focal_length    REAL,
    f_number        REAL,
    aver_raw_signal_R1 REAL, vari_raw_signal_R1 REAL,
    aver_raw_signal_G2 REAL, vari_raw_signal_G2 REAL,
    aver_raw_signal_G3 REAL, vari_raw_signal_G3 REAL,
    aver_raw_signal_B4 REAL, vari_raw_signal_B4 REAL,
    aver_dark_R1    REAL, vari_dark_R1 REAL,
    aver_dark_G2    REAL, vari_dark_G2 REAL,
    aver_dark_G3    REAL, vari_dark_G3 REAL,
    aver_dark_B4    REAL, vari_dark_B4 REAL,
    observer        TEXT,
    organization    TEXT,
    email           TEXT,
    location        TEXT
);

CREATE INDEX IF NOT EXISTS idx_image_session_type_state
    ON image_t(session, type, state);

CREATE TABLE IF NOT EXISTS master_dark_t (
    session         INTEGER PRIMARY KEY,
    roi             TEXT,
    N               INTEGER NOT NULL,
    aver_R1 REAL, vari_R1 REAL,
    aver_G2 REAL, vari_G2 REAL,
    aver_G3 REAL, vari_G3 REAL,
    aver_B4 REAL, vari_B4 REAL,
    min_exptime     REAL,
    max_exptime     REAL
);
";

const V2_BIAS_CORNER: &str = "
ALTER TABLE image_t ADD COLUMN dark_roi TEXT;
ALTER TABLE image_t ADD COLUMN aver_bias_R1 REAL;
ALTER TABLE image_t ADD COLUMN vari_bias_R1 REAL;
ALTER TABLE image_t ADD COLUMN aver_bias_G2 REAL;
ALTER TABLE image_t ADD COLUMN vari_bias_G2 REAL;
ALTER TABLE image_t ADD COLUMN aver_bias_G3 REAL;
ALTER TABLE image_t ADD COLUMN vari_bias_G3 REAL;
ALTER TABLE image_t ADD COLUMN aver_bias_B4 REAL;
ALTER TABLE image_t ADD COLUMN vari_bias_B4 REAL;
";

/// Bring the schema up to `SCHEMA_VERSION`.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(V1_BASE)?;
        for state in [
            ProcessingState::Registered,
            ProcessingState::RawStats,
            ProcessingState::DarkSubtracted,
        ] {
            conn.execute(
                "INSERT OR REPLACE INTO state_t (state, label) VALUES (?1, ?2)",
                rusqlite::params![state, state.label()],
            )?;
        }
    }
    if version < 2 {
        conn.execute_batch(V2_BIAS_CORNER)?;
    }
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::debug!("Migrated store schema from v{} to v{}", version, SCHEMA_VERSION);
    }
    Ok(())
}

/// `<prefix>R1, <prefix>G2, ...` column names.
pub(crate) fn channel_columns(prefix: &str) -> [String; 4] {
    Channel::ALL.map(|c| format!("{prefix}{}", c.label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_and_again() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let label: String = conn
            .query_row("SELECT label FROM state_t WHERE state = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(label, "RAW STATS");
    }

    #[test]
    fn test_migrate_v1_store_adds_bias_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_BASE).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        migrate(&conn).unwrap();
        conn.execute("UPDATE image_t SET aver_bias_B4 = 1.0, dark_roi = 'x'", [])
            .unwrap();
    }

    #[test]
    fn test_channel_columns() {
        assert_eq!(
            channel_columns("aver_dark_"),
            ["aver_dark_R1", "aver_dark_G2", "aver_dark_G3", "aver_dark_B4"].map(String::from)
        );
    }
}
