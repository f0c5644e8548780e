//! Master dark aggregation over a session's DARK frames.

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{ChannelStats, ImageType, ProcessingState, SessionId};

use super::schema::channel_columns;

/// Channel-wise dark profile of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterDark {
    pub session: SessionId,
    /// Statistics window of the contributing darks
    pub roi: Option<String>,
    /// Number of contributing dark frames
    pub n: usize,
    /// Mean of the dark means and pooled variance `Σvariance / N`
    pub stats: [ChannelStats; 4],
    pub min_exptime: Option<f64>,
    pub max_exptime: Option<f64>,
}

impl MasterDark {
    /// Whether the contributing darks had different exposure times.
    pub fn mixed_exposures(&self) -> bool {
        match (self.min_exptime, self.max_exptime) {
            (Some(min), Some(max)) => min != max,
            _ => false,
        }
    }
}

/// Aggregate the DARK frames of `session` with raw statistics.
///
/// Returns `None` when no dark frame qualifies.
pub fn aggregate(conn: &Connection, session: SessionId) -> rusqlite::Result<Option<MasterDark>> {
    let aggregates: Vec<String> = channel_columns("aver_raw_signal_")
        .into_iter()
        .zip(channel_columns("vari_raw_signal_"))
        .map(|(aver, vari)| format!("AVG({aver}), SUM({vari}) / COUNT(*)"))
        .collect();
    let sql = format!(
        "SELECT COUNT(*), MIN(roi), MIN(exptime), MAX(exptime), {}
         FROM image_t
         WHERE session = ?1 AND type = ?2 AND state >= ?3",
        aggregates.join(", ")
    );

    let dark = conn.query_row(
        &sql,
        params![session, ImageType::Dark, ProcessingState::RawStats],
        |row| {
            let n: i64 = row.get(0)?;
            let mut stats = [ChannelStats::default(); 4];
            for (i, slot) in stats.iter_mut().enumerate() {
                *slot = ChannelStats {
                    mean: row.get::<_, Option<f64>>(4 + 2 * i)?.unwrap_or_default(),
                    variance: row.get::<_, Option<f64>>(5 + 2 * i)?.unwrap_or_default(),
                };
            }
            Ok(MasterDark {
                session,
                roi: row.get(1)?,
                n: n.max(0) as usize,
                stats,
                min_exptime: row.get(2)?,
                max_exptime: row.get(3)?,
            })
        },
    )?;

    Ok((dark.n > 0).then_some(dark))
}

/// Store `dark` as the session's master dark, replacing any previous one.
pub fn replace(conn: &Connection, dark: &MasterDark) -> rusqlite::Result<()> {
    let m = &dark.stats;
    conn.execute(
        "INSERT OR REPLACE INTO master_dark_t (
            session, roi, N,
            aver_R1, vari_R1, aver_G2, vari_G2, aver_G3, vari_G3, aver_B4, vari_B4,
            min_exptime, max_exptime)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            dark.session,
            dark.roi,
            dark.n as i64,
            m[0].mean,
            m[0].variance,
            m[1].mean,
            m[1].variance,
            m[2].mean,
            m[2].variance,
            m[3].mean,
            m[3].variance,
            dark.min_exptime,
            dark.max_exptime,
        ],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, session: SessionId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM master_dark_t WHERE session = ?1", [session])
}

pub fn get(conn: &Connection, session: SessionId) -> rusqlite::Result<Option<MasterDark>> {
    conn.query_row(
        "SELECT session, roi, N,
                aver_R1, vari_R1, aver_G2, vari_G2, aver_G3, vari_G3, aver_B4, vari_B4,
                min_exptime, max_exptime
         FROM master_dark_t WHERE session = ?1",
        [session],
        |row| {
            let mut stats = [ChannelStats::default(); 4];
            for (i, slot) in stats.iter_mut().enumerate() {
                *slot = ChannelStats {
                    mean: row.get(3 + 2 * i)?,
                    variance: row.get(4 + 2 * i)?,
                };
            }
            Ok(MasterDark {
                session: row.get(0)?,
                roi: row.get(1)?,
                n: row.get::<_, i64>(2)?.max(0) as usize,
                stats,
                min_exptime: row.get(11)?,
                max_exptime: row.get(12)?,
            })
        },
    )
    .optional()
}
