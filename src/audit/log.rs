//! Audit sinks: the CSV access log and an in-memory sink.

use super::record::{AuditRecord, EventKind, HEADER, TIMESTAMP_FORMAT};
use crate::config::{SnapshotFormat, StorageConfig};
use crate::perception::{Frame, PixelFormat};
use chrono::{Local, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur while persisting audit data.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Log file or snapshot directory could not be written.
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Row could not be encoded or parsed.
    #[error("audit CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Snapshot could not be encoded.
    #[error("snapshot encoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// Frame cannot be turned into an image.
    #[error("snapshot rejected: {0}")]
    Snapshot(String),
    /// A row in the log does not parse.
    #[error("malformed audit row {line}: {reason}")]
    Malformed {
        /// 1-based row number, header included.
        line: u64,
        /// What was wrong with the row.
        reason: String,
    },
}

/// Trait for audit sinks.
pub trait AuditSink: Send {
    /// Appends one row.
    fn record(&mut self, kind: EventKind, subject: &str) -> Result<AuditRecord, AuditError>;

    /// Appends one row and stores an image of the scene.
    ///
    /// Only [`EventKind::AlertUnknown`] stores the image; other kinds
    /// behave like [`AuditSink::record`].
    fn record_with_snapshot(
        &mut self,
        kind: EventKind,
        subject: &str,
        frame: &Frame,
    ) -> Result<AuditRecord, AuditError>;
}

/// Append-only CSV access log with snapshot directory.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    snapshot_dir: PathBuf,
    format: SnapshotFormat,
    rows_written: u64,
}

impl EventLog {
    /// Creates a log over the configured paths. Files are created lazily.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            path: config.access_log.clone(),
            snapshot_dir: config.snapshot_dir.clone(),
            format: config.snapshot_format,
            rows_written: 0,
        }
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot directory.
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Rows written by this instance.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Reads every row back.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>, AuditError> {
        read_log(&self.path)
    }

    fn append_row(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record([
            record.timestamp_column().as_str(),
            record.kind.as_str(),
            record.subject.as_str(),
        ])?;
        writer.flush()?;

        self.rows_written += 1;
        Ok(())
    }

    fn save_snapshot(&self, file_name: &str, frame: &Frame) -> Result<PathBuf, AuditError> {
        if !frame.is_valid() {
            return Err(AuditError::Snapshot(format!(
                "frame {} buffer does not match {}x{}",
                frame.sequence(),
                frame.width(),
                frame.height()
            )));
        }
        fs::create_dir_all(&self.snapshot_dir)?;
        let path = self.snapshot_dir.join(file_name);

        let format = match self.format {
            SnapshotFormat::Jpeg => image::ImageFormat::Jpeg,
            SnapshotFormat::Png => image::ImageFormat::Png,
        };
        let (width, height) = (frame.width(), frame.height());
        let pixels = frame.pixels().to_vec();

        match frame.format() {
            PixelFormat::Gray8 => image::GrayImage::from_raw(width, height, pixels)
                .ok_or_else(|| AuditError::Snapshot("grayscale buffer too small".into()))?
                .save_with_format(&path, format)?,
            PixelFormat::Rgb8 => image::RgbImage::from_raw(width, height, pixels)
                .ok_or_else(|| AuditError::Snapshot("RGB buffer too small".into()))?
                .save_with_format(&path, format)?,
        }

        tracing::info!(path = %path.display(), "Saved alert snapshot");
        Ok(path)
    }
}

impl AuditSink for EventLog {
    fn record(&mut self, kind: EventKind, subject: &str) -> Result<AuditRecord, AuditError> {
        let record = AuditRecord::new(now(), kind, subject);
        self.append_row(&record)?;
        tracing::debug!(kind = %kind, subject, "Audit row written");
        Ok(record)
    }

    fn record_with_snapshot(
        &mut self,
        kind: EventKind,
        subject: &str,
        frame: &Frame,
    ) -> Result<AuditRecord, AuditError> {
        let mut record = AuditRecord::new(now(), kind, subject);

        // The row and the image are independent; a failure in one
        // does not suppress the other.
        let row = self.append_row(&record);
        let snapshot = if kind.takes_snapshot() {
            let name = record.snapshot_file_name(self.format.extension());
            self.save_snapshot(&name, frame).map(Some)
        } else {
            Ok(None)
        };

        row?;
        record.snapshot = snapshot?;
        Ok(record)
    }
}

/// Parses a CSV access log.
pub fn read_log(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| AuditError::Malformed { line, reason };

        let (ts, kind, subject) = match (row.get(0), row.get(1), row.get(2)) {
            (Some(ts), Some(kind), Some(subject)) => (ts, kind, subject),
            _ => return Err(malformed("expected three columns".into())),
        };
        let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
            .map_err(|e| malformed(e.to_string()))?;
        let kind: EventKind = kind.parse().map_err(malformed)?;

        records.push(AuditRecord::new(timestamp, kind, subject));
    }
    Ok(records)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<AuditRecord>,
    failing: bool,
}

/// In-memory audit sink for testing and embedding.
///
/// Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuditSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All records so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.state().records.clone()
    }

    /// Number of records of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.state().records.iter().filter(|r| r.kind == kind).count()
    }

    /// Makes subsequent writes fail, to exercise persistence errors.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    fn push(&self, mut record: AuditRecord, with_snapshot: bool) -> Result<AuditRecord, AuditError> {
        let mut state = self.state();
        if state.failing {
            return Err(AuditError::Io(std::io::Error::other(
                "memory sink set to fail",
            )));
        }
        if with_snapshot && record.kind.takes_snapshot() {
            record.snapshot = Some(PathBuf::from(record.snapshot_file_name("mem")));
        }
        state.records.push(record.clone());
        Ok(record)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, kind: EventKind, subject: &str) -> Result<AuditRecord, AuditError> {
        self.push(AuditRecord::new(now(), kind, subject), false)
    }

    fn record_with_snapshot(
        &mut self,
        kind: EventKind,
        subject: &str,
        _frame: &Frame,
    ) -> Result<AuditRecord, AuditError> {
        self.push(AuditRecord::new(now(), kind, subject), true)
    }
}
