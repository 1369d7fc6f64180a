//! Append-only CSV attendance ledger.
//!
//! External shape: UTF-8 text, header row `Name,Time,Status`, one row per
//! recorded identity in `name,HH:MM:SS,status` order. Rows go through a
//! real CSV serializer, so a delimiter inside a name is quoted instead of
//! corrupting the row. Dedup is answered from an in-memory name set loaded
//! once at open and maintained on every append; the file itself is a
//! single-writer store and is never rewritten in place.

use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger serialization error: {0}")]
    Csv(#[from] csv::Error),
}

/// Attendance status derived from the time of day a record lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Late,
}

/// One recorded identity. `name` is unique across the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEntry {
    pub name: String,
    pub time: NaiveTime,
    pub status: AttendanceStatus,
}

/// On-disk row shape; time is kept as `HH:MM:SS` text.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Status")]
    status: AttendanceStatus,
}

const TIME_FORMAT: &str = "%H:%M:%S";

/// CSV-backed attendance store with exactly-once-per-identity semantics.
pub struct AttendanceLedger {
    path: PathBuf,
    cutoff: NaiveTime,
    recorded: HashSet<String>,
}

impl AttendanceLedger {
    /// Open the ledger at `path`, creating it with a header row when
    /// absent, and load the already-recorded names.
    pub fn open(path: &Path, cutoff: NaiveTime) -> Result<Self, LedgerError> {
        if !path.exists() {
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record(["Name", "Time", "Status"])?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "initialized attendance ledger");
            return Ok(Self {
                path: path.to_path_buf(),
                cutoff,
                recorded: HashSet::new(),
            });
        }

        let recorded = load_recorded_names(path)?;
        tracing::info!(
            path = %path.display(),
            entries = recorded.len(),
            "opened attendance ledger"
        );
        Ok(Self {
            path: path.to_path_buf(),
            cutoff,
            recorded,
        })
    }

    /// Whether `name` already holds a ledger row.
    pub fn is_recorded(&self, name: &str) -> bool {
        self.recorded.contains(name)
    }

    /// Record `name` at the current wall-clock time of day.
    ///
    /// Returns `Ok(true)` when a new row was appended, `Ok(false)` when
    /// the name was already recorded and the ledger is untouched.
    pub fn record(&mut self, name: &str) -> Result<bool, LedgerError> {
        self.record_at(name, Local::now().time())
    }

    /// Record `name` as of the given time of day.
    pub fn record_at(&mut self, name: &str, time: NaiveTime) -> Result<bool, LedgerError> {
        if self.recorded.contains(name) {
            return Ok(false);
        }

        let status = self.status_for(time);
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(LedgerRow {
            name: name.to_string(),
            time: time.format(TIME_FORMAT).to_string(),
            status,
        })?;
        writer.flush()?;

        self.recorded.insert(name.to_string());
        tracing::info!(name, time = %time.format(TIME_FORMAT), ?status, "attendance recorded");
        Ok(true)
    }

    /// Status for a record landing at `time`: at or before the cutoff is
    /// Present, after it is Late.
    pub fn status_for(&self, time: NaiveTime) -> AttendanceStatus {
        if time <= self.cutoff {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// Number of recorded identities.
    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }

    /// Re-read the persisted rows in file order. Rows that do not parse as
    /// `name,HH:MM:SS,status` are skipped.
    pub fn entries(&self) -> Result<Vec<AttendanceEntry>, LedgerError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let mut entries = Vec::new();
        for row in reader.deserialize::<LedgerRow>() {
            let Ok(row) = row else { continue };
            let Ok(time) = NaiveTime::parse_from_str(&row.time, TIME_FORMAT) else {
                continue;
            };
            entries.push(AttendanceEntry {
                name: row.name,
                time,
                status: row.status,
            });
        }
        Ok(entries)
    }
}

/// First field of every data row. Rows a prior corrupted run left
/// malformed still contribute their first field when it decodes; dedup on
/// such rows is best-effort.
fn load_recorded_names(path: &Path) -> Result<HashSet<String>, LedgerError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut names = HashSet::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        if let Some(name) = record.get(0) {
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }
    Ok(names)
}
