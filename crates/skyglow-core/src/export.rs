//! `;`-delimited CSV export of dark-subtracted LIGHT frames.
//!
//! One file per session plus a cumulative file covering every session,
//! both rewritten from the store on each export.

use rusqlite::Connection;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::stats::round_to;
use crate::store::{images, LightRecord};
use crate::types::SessionId;

/// Column names, in file order.
pub const HEADERS: [&str; 22] = [
    "session",
    "observer",
    "organization",
    "email",
    "location",
    "type",
    "tstamp",
    "name",
    "model",
    "iso",
    "exptime",
    "focal_length",
    "f_number",
    "roi",
    "aver_signal_R1",
    "stdev_signal_R1",
    "aver_signal_G2",
    "stdev_signal_G2",
    "aver_signal_G3",
    "stdev_signal_G3",
    "aver_signal_B4",
    "stdev_signal_B4",
];

/// One exported image: raw signal minus master dark, per channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvRow {
    pub session: SessionId,
    pub observer: String,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub location: String,
    #[serde(rename = "type")]
    pub image_type: String,
    pub tstamp: String,
    pub name: String,
    pub model: String,
    pub iso: Option<u32>,
    pub exptime: Option<f64>,
    pub focal_length: Option<f64>,
    pub f_number: Option<f64>,
    pub roi: String,
    #[serde(rename = "aver_signal_R1")]
    pub aver_signal_r1: f64,
    #[serde(rename = "stdev_signal_R1")]
    pub stdev_signal_r1: f64,
    #[serde(rename = "aver_signal_G2")]
    pub aver_signal_g2: f64,
    #[serde(rename = "stdev_signal_G2")]
    pub stdev_signal_g2: f64,
    #[serde(rename = "aver_signal_G3")]
    pub aver_signal_g3: f64,
    #[serde(rename = "stdev_signal_G3")]
    pub stdev_signal_g3: f64,
    #[serde(rename = "aver_signal_B4")]
    pub aver_signal_b4: f64,
    #[serde(rename = "stdev_signal_B4")]
    pub stdev_signal_b4: f64,
}

impl From<&LightRecord> for CsvRow {
    fn from(record: &LightRecord) -> Self {
        let signal = |i: usize| {
            let (raw, dark) = (record.raw[i], record.dark[i]);
            (
                round_to(raw.mean - dark.mean, 1),
                round_to((raw.variance + dark.variance).max(0.0).sqrt(), 3),
            )
        };
        let (r1, r1_sd) = signal(0);
        let (g2, g2_sd) = signal(1);
        let (g3, g3_sd) = signal(2);
        let (b4, b4_sd) = signal(3);

        Self {
            session: record.session,
            observer: record.tags.observer.clone(),
            organization: record.tags.organization.clone(),
            email: record.tags.email.clone(),
            location: record.tags.location.clone(),
            image_type: record.image_type.to_string(),
            tstamp: record.tstamp.clone(),
            name: record.name.clone(),
            model: record.model.clone(),
            iso: record.iso,
            exptime: record.exptime,
            focal_length: record.focal_length,
            f_number: record.f_number,
            roi: record.roi.clone(),
            aver_signal_r1: r1,
            stdev_signal_r1: r1_sd,
            aver_signal_g2: g2,
            stdev_signal_g2: g2_sd,
            aver_signal_g3: g3,
            stdev_signal_g3: g3_sd,
            aver_signal_b4: b4,
            stdev_signal_b4: b4_sd,
        }
    }
}

/// Writes CSV rows with a header line, `;`-delimited.
pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows_written: usize,
}

impl<W: Write> CsvWriter<W> {
    /// Create a writer and emit the header line.
    pub fn new(writer: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(HEADERS)?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn write(&mut self, row: &CsvRow) -> Result<()> {
        self.writer.serialize(row)?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_all(&mut self, rows: &[CsvRow]) -> Result<()> {
        for row in rows {
            self.write(row)?;
        }
        Ok(())
    }

    /// Get the number of rows written, header excluded.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

/// Files written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub session_file: PathBuf,
    pub session_rows: usize,
    pub global_file: PathBuf,
    pub global_rows: usize,
}

/// Exports the store to the CSV directory.
pub struct CsvExporter {
    csv_dir: PathBuf,
    global_name: String,
}

impl CsvExporter {
    pub fn new(csv_dir: impl Into<PathBuf>, global_name: impl Into<String>) -> Self {
        Self {
            csv_dir: csv_dir.into(),
            global_name: global_name.into(),
        }
    }

    /// Path of the per-session file.
    pub fn session_path(&self, session: SessionId) -> PathBuf {
        self.csv_dir.join(format!("{session}.csv"))
    }

    pub fn global_path(&self) -> PathBuf {
        self.csv_dir.join(&self.global_name)
    }

    /// Write `<csv_dir>/<session>.csv` and rewrite the global file.
    pub fn export(&self, conn: &Connection, session: SessionId) -> Result<ExportSummary> {
        std::fs::create_dir_all(&self.csv_dir)?;

        let session_rows = Self::rows(conn, Some(session))?;
        let session_file = self.session_path(session);
        write_file(&session_file, &session_rows)?;

        let global_rows = Self::rows(conn, None)?;
        let global_file = self.global_path();
        write_file(&global_file, &global_rows)?;

        tracing::info!(
            "Exported {} rows to {} ({} rows in {})",
            session_rows.len(),
            session_file.display(),
            global_rows.len(),
            global_file.display()
        );

        Ok(ExportSummary {
            session_file,
            session_rows: session_rows.len(),
            global_file,
            global_rows: global_rows.len(),
        })
    }

    fn rows(conn: &Connection, session: Option<SessionId>) -> Result<Vec<CsvRow>> {
        Ok(images::dark_subtracted_lights(conn, session)?
            .iter()
            .map(CsvRow::from)
            .collect())
    }
}

fn write_file(path: &Path, rows: &[CsvRow]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = CsvWriter::new(std::io::BufWriter::new(file))?;
    writer.write_all(rows)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelStats, ImageType, ObserverTags};

    fn record() -> LightRecord {
        LightRecord {
            session: SessionId(20200101220000),
            tags: ObserverTags {
                observer: "Jane Roe".into(),
                organization: None,
                email: Some("jane@example.org".into()),
                location: "Madrid".into(),
            },
            image_type: ImageType::Light,
            tstamp: "2020-01-01T22:05:00".into(),
            name: "IMG_0001.CR2".into(),
            model: "Canon EOS 550D".into(),
            iso: Some(800),
            exptime: Some(30.0),
            focal_length: None,
            f_number: Some(4.0),
            roi: "[500:1000,300:700]".into(),
            raw: [ChannelStats { mean: 2100.5, variance: 16.0 }; 4],
            dark: [ChannelStats { mean: 2048.25, variance: 9.0 }; 4],
        }
    }

    #[test]
    fn test_row_subtracts_dark() {
        let row = CsvRow::from(&record());
        assert_eq!(row.aver_signal_r1, 52.3);
        assert_eq!(row.stdev_signal_b4, 5.0);
        assert_eq!(row.image_type, "LIGHT");
    }

    #[test]
    fn test_stdev_rounding() {
        let mut record = record();
        record.raw[1].variance = 1.0;
        record.dark[1].variance = 1.0;
        let row = CsvRow::from(&record);
        assert_eq!(row.stdev_signal_g2, 1.414);
    }

    #[test]
    fn test_writer_header_and_delimiter() {
        let mut writer = CsvWriter::new(Vec::new()).unwrap();
        writer.write(&CsvRow::from(&record())).unwrap();
        assert_eq!(writer.rows_written(), 1);

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADERS.join(";"));
        assert!(lines[1].starts_with("20200101220000;Jane Roe;;jane@example.org;Madrid;LIGHT;"));
        assert_eq!(lines[1].split(';').count(), HEADERS.len());
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let mut writer = CsvWriter::new(Vec::new()).unwrap();
        writer.write_all(&[]).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(output.lines().count(), 1);
    }
}
