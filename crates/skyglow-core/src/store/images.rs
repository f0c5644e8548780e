//! Queries over `image_t` and the `candidate_t` staging table.

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{
    ChannelStats, ExifMetadata, ImageType, ObserverTags, ProcessingState, Region, SessionId,
};

use super::master_dark::MasterDark;
use super::schema::channel_columns;

/// Name and hash of an image row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub hash: String,
    pub name: String,
}

/// Statistics of the bias corner window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasCorner {
    pub region: Region,
    pub stats: [ChannelStats; 4],
}

/// Everything the stats stage records for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStats {
    pub exif: ExifMetadata,
    pub roi: Region,
    pub signal: [ChannelStats; 4],
    pub bias: Option<BiasCorner>,
}

/// A dark-subtracted LIGHT image, as exported.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRecord {
    pub session: SessionId,
    pub tags: ObserverTags,
    pub image_type: ImageType,
    pub tstamp: String,
    pub name: String,
    pub model: String,
    pub iso: Option<u32>,
    pub exptime: Option<f64>,
    pub focal_length: Option<f64>,
    pub f_number: Option<f64>,
    pub roi: String,
    pub raw: [ChannelStats; 4],
    pub dark: [ChannelStats; 4],
}

/// Image counts of one session, by type and state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub session: SessionId,
    pub images: usize,
    pub light: usize,
    pub dark: usize,
    pub registered: usize,
    pub raw_stats: usize,
    pub dark_subtracted: usize,
}

// ---------------------------------------------------------------------------
// Candidate staging
// ---------------------------------------------------------------------------

/// Replace the contents of the temporary `candidate_t` table.
pub fn stage_candidates<'a>(
    conn: &Connection,
    candidates: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> rusqlite::Result<usize> {
    conn.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS candidate_t (name TEXT NOT NULL, hash TEXT NOT NULL);
         DELETE FROM candidate_t;",
    )?;
    let mut stmt = conn.prepare("INSERT INTO candidate_t (name, hash) VALUES (?1, ?2)")?;
    let mut count = 0;
    for (name, hash) in candidates {
        stmt.execute(params![name, hash])?;
        count += 1;
    }
    Ok(count)
}

/// Distinct sessions owning any staged hash.
pub fn candidate_sessions(conn: &Connection) -> rusqlite::Result<Vec<SessionId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT i.session FROM image_t AS i
         JOIN candidate_t AS c ON c.hash = i.hash
         ORDER BY i.session",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Staged files whose hash is not in the store yet.
pub fn candidates_to_add(conn: &Connection) -> rusqlite::Result<Vec<ImageRef>> {
    let mut stmt = conn.prepare(
        "SELECT c.hash, c.name FROM candidate_t AS c
         WHERE c.hash NOT IN (SELECT hash FROM image_t)
         ORDER BY c.name",
    )?;
    let rows = stmt.query_map([], image_ref)?;
    rows.collect()
}

/// Images of `session` whose file is no longer staged.
pub fn images_to_delete(conn: &Connection, session: SessionId) -> rusqlite::Result<Vec<ImageRef>> {
    let mut stmt = conn.prepare(
        "SELECT hash, name FROM image_t
         WHERE session = ?1 AND hash NOT IN (SELECT hash FROM candidate_t)
         ORDER BY name",
    )?;
    let rows = stmt.query_map([session], image_ref)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register an image at REGISTERED/UNKNOWN.
///
/// Fails with a constraint violation if the hash is already stored.
pub fn insert_image(
    conn: &Connection,
    image: &ImageRef,
    session: SessionId,
    tags: &ObserverTags,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO image_t (hash, name, session, type, state, observer, organization, email, location)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            image.hash,
            image.name,
            session,
            ImageType::Unknown,
            ProcessingState::Registered,
            tags.observer,
            tags.organization,
            tags.email,
            tags.location,
        ],
    )?;
    Ok(())
}

pub fn delete_image(conn: &Connection, hash: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM image_t WHERE hash = ?1", [hash])
}

/// Name of the stored image with this hash.
pub fn name_of(conn: &Connection, hash: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT name FROM image_t WHERE hash = ?1", [hash], |row| row.get(0))
        .optional()
}

pub fn session_exists(conn: &Connection, session: SessionId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM image_t WHERE session = ?1)
             OR EXISTS (SELECT 1 FROM master_dark_t WHERE session = ?1)",
        [session],
        |row| row.get(0),
    )
}

pub fn latest_session(conn: &Connection) -> rusqlite::Result<Option<SessionId>> {
    conn.query_row("SELECT MAX(session) FROM image_t", [], |row| row.get(0))
}

// ---------------------------------------------------------------------------
// Stats stage
// ---------------------------------------------------------------------------

/// Images of `session` still waiting for raw statistics.
pub fn pending_stats(conn: &Connection, session: SessionId) -> rusqlite::Result<Vec<ImageRef>> {
    let mut stmt = conn.prepare(
        "SELECT hash, name FROM image_t WHERE session = ?1 AND state < ?2 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![session, ProcessingState::RawStats], image_ref)?;
    rows.collect()
}

/// Record EXIF fields and raw statistics, advancing the image to RAW_STATS.
pub fn store_stats(conn: &Connection, hash: &str, stats: &ImageStats) -> rusqlite::Result<()> {
    let exif = &stats.exif;
    let s = &stats.signal;
    conn.execute(
        "UPDATE image_t SET
            tstamp = ?2, model = ?3, iso = ?4, exptime = ?5, focal_length = ?6, f_number = ?7,
            roi = ?8,
            aver_raw_signal_R1 = ?9,  vari_raw_signal_R1 = ?10,
            aver_raw_signal_G2 = ?11, vari_raw_signal_G2 = ?12,
            aver_raw_signal_G3 = ?13, vari_raw_signal_G3 = ?14,
            aver_raw_signal_B4 = ?15, vari_raw_signal_B4 = ?16,
            state = ?17
         WHERE hash = ?1",
        params![
            hash,
            exif.tstamp,
            exif.model,
            exif.iso,
            exif.exptime,
            exif.focal_length,
            exif.f_number,
            stats.roi.to_string(),
            s[0].mean,
            s[0].variance,
            s[1].mean,
            s[1].variance,
            s[2].mean,
            s[2].variance,
            s[3].mean,
            s[3].variance,
            ProcessingState::RawStats,
        ],
    )?;

    if let Some(bias) = &stats.bias {
        let b = &bias.stats;
        conn.execute(
            "UPDATE image_t SET
                dark_roi = ?2,
                aver_bias_R1 = ?3, vari_bias_R1 = ?4,
                aver_bias_G2 = ?5, vari_bias_G2 = ?6,
                aver_bias_G3 = ?7, vari_bias_G3 = ?8,
                aver_bias_B4 = ?9, vari_bias_B4 = ?10
             WHERE hash = ?1",
            params![
                hash,
                bias.region.to_string(),
                b[0].mean,
                b[0].variance,
                b[1].mean,
                b[1].variance,
                b[2].mean,
                b[2].variance,
                b[3].mean,
                b[3].variance,
            ],
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification and dark subtraction
// ---------------------------------------------------------------------------

/// Images of `session` not classified yet.
pub fn unclassified(conn: &Connection, session: SessionId) -> rusqlite::Result<Vec<ImageRef>> {
    let mut stmt = conn.prepare(
        "SELECT hash, name FROM image_t WHERE session = ?1 AND type = ?2 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![session, ImageType::Unknown], image_ref)?;
    rows.collect()
}

pub fn set_type(conn: &Connection, hash: &str, image_type: ImageType) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE image_t SET type = ?2 WHERE hash = ?1",
        params![hash, image_type],
    )?;
    Ok(())
}

/// Write the master dark into every LIGHT image of its session at
/// RAW_STATS or later, advancing them to DARK_SUBTRACTED.
pub fn apply_master_dark(conn: &Connection, dark: &MasterDark) -> rusqlite::Result<usize> {
    let m = &dark.stats;
    conn.execute(
        "UPDATE image_t SET
            aver_dark_R1 = ?2, vari_dark_R1 = ?3,
            aver_dark_G2 = ?4, vari_dark_G2 = ?5,
            aver_dark_G3 = ?6, vari_dark_G3 = ?7,
            aver_dark_B4 = ?8, vari_dark_B4 = ?9,
            state = ?10
         WHERE session = ?1 AND type = ?11 AND state >= ?12",
        params![
            dark.session,
            m[0].mean,
            m[0].variance,
            m[1].mean,
            m[1].variance,
            m[2].mean,
            m[2].variance,
            m[3].mean,
            m[3].variance,
            ProcessingState::DarkSubtracted,
            ImageType::Light,
            ProcessingState::RawStats,
        ],
    )
}

/// Drop the master dark from the DARK_SUBTRACTED LIGHT images of `session`,
/// moving them back to RAW_STATS.
pub fn clear_master_dark(conn: &Connection, session: SessionId) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE image_t SET
            aver_dark_R1 = NULL, vari_dark_R1 = NULL,
            aver_dark_G2 = NULL, vari_dark_G2 = NULL,
            aver_dark_G3 = NULL, vari_dark_G3 = NULL,
            aver_dark_B4 = NULL, vari_dark_B4 = NULL,
            state = ?2
         WHERE session = ?1 AND type = ?3 AND state = ?4",
        params![
            session,
            ProcessingState::RawStats,
            ImageType::Light,
            ProcessingState::DarkSubtracted,
        ],
    )
}

/// Send every processed image of `session` back to REGISTERED/UNKNOWN.
pub fn reset_session(conn: &Connection, session: SessionId) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE image_t SET state = ?2, type = ?3 WHERE session = ?1 AND state >= ?4",
        params![
            session,
            ProcessingState::Registered,
            ImageType::Unknown,
            ProcessingState::RawStats,
        ],
    )
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Image counts per session, oldest first; restricted to one session if given.
pub fn session_summaries(
    conn: &Connection,
    session: Option<SessionId>,
) -> rusqlite::Result<Vec<SessionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT session, COUNT(*),
                SUM(type = 'LIGHT'), SUM(type = 'DARK'),
                SUM(state = 0), SUM(state = 1), SUM(state = 2)
         FROM image_t
         WHERE ?1 IS NULL OR session = ?1
         GROUP BY session ORDER BY session",
    )?;
    let count = |row: &rusqlite::Row<'_>, idx: usize| -> rusqlite::Result<usize> {
        Ok(row.get::<_, i64>(idx)?.max(0) as usize)
    };
    let rows = stmt.query_map([session], |row| {
        Ok(SessionSummary {
            session: row.get(0)?,
            images: count(row, 1)?,
            light: count(row, 2)?,
            dark: count(row, 3)?,
            registered: count(row, 4)?,
            raw_stats: count(row, 5)?,
            dark_subtracted: count(row, 6)?,
        })
    })?;
    rows.collect()
}

/// Dark-subtracted LIGHT images, ordered by session and capture time.
pub fn dark_subtracted_lights(
    conn: &Connection,
    session: Option<SessionId>,
) -> rusqlite::Result<Vec<LightRecord>> {
    let stat_columns: Vec<String> = channel_columns("aver_raw_signal_")
        .into_iter()
        .zip(channel_columns("vari_raw_signal_"))
        .chain(channel_columns("aver_dark_").into_iter().zip(channel_columns("vari_dark_")))
        .map(|(aver, vari)| format!("{aver}, {vari}"))
        .collect();
    let sql = format!(
        "SELECT session, observer, organization, email, location, type, tstamp, name, model,
                iso, exptime, focal_length, f_number, roi, {}
         FROM image_t
         WHERE type = ?1 AND state = ?2 AND (?3 IS NULL OR session = ?3)
         ORDER BY session, tstamp, name",
        stat_columns.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![ImageType::Light, ProcessingState::DarkSubtracted, session],
        |row| {
            let stats_at = |start: usize| -> rusqlite::Result<[ChannelStats; 4]> {
                let mut out = [ChannelStats::default(); 4];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = ChannelStats {
                        mean: row.get::<_, Option<f64>>(start + 2 * i)?.unwrap_or_default(),
                        variance: row.get::<_, Option<f64>>(start + 2 * i + 1)?.unwrap_or_default(),
                    };
                }
                Ok(out)
            };
            Ok(LightRecord {
                session: row.get(0)?,
                tags: ObserverTags {
                    observer: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    organization: row.get(2)?,
                    email: row.get(3)?,
                    location: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                },
                image_type: row.get(5)?,
                tstamp: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                name: row.get(7)?,
                model: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                iso: row.get(9)?,
                exptime: row.get(10)?,
                focal_length: row.get(11)?,
                f_number: row.get(12)?,
                roi: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
                raw: stats_at(14)?,
                dark: stats_at(22)?,
            })
        },
    )?;
    rows.collect()
}

fn image_ref(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRef> {
    Ok(ImageRef {
        hash: row.get(0)?,
        name: row.get(1)?,
    })
}
