//! Buffered daily CSV writer for bar records.
//!
//! - Records are buffered in memory and written in batches
//! - One file per local calendar day: `<dir>/<PREFIX>_<YYYY-MM-DD>.csv`
//! - The first write of a day writes the header; later writes append rows only
//! - Columns follow field names in first-observed order
//! - A failed write leaves the buffer intact for the next attempt and the
//!   file as it was: each batch lands whole or not at all

use crate::error::{PersistenceError, PersistenceResult};
use barstream_core::BarRecord;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Buffer length that triggers an automatic flush.
pub const FLUSH_THRESHOLD: usize = 100;

/// Buffered CSV writer.
///
/// Owns the in-memory buffer. Single writer (`append`/`push`) and single
/// clearer (`flush`), both on the caller's task.
pub struct CsvBarWriter {
    /// Base directory for output files.
    data_dir: PathBuf,
    /// File name prefix (the symbol).
    prefix: String,
    /// Buffer of pending records.
    buffer: Vec<BarRecord>,
    /// Buffer size that triggers a flush in `push`.
    threshold: usize,
    /// Rows persisted by this writer since creation.
    records_written: usize,
}

impl CsvBarWriter {
    /// Create a writer with the standard flush threshold.
    pub fn new(data_dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self::with_threshold(data_dir, prefix, FLUSH_THRESHOLD)
    }

    /// Create a writer with a custom flush threshold.
    pub fn with_threshold(data_dir: impl Into<PathBuf>, prefix: &str, threshold: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: prefix.to_string(),
            buffer: Vec::with_capacity(threshold),
            threshold: threshold.max(1),
            records_written: 0,
        }
    }

    /// Add a record to the end of the buffer. Never flushes.
    pub fn append(&mut self, record: BarRecord) {
        self.buffer.push(record);
    }

    /// Add a record and flush once the threshold is reached.
    ///
    /// Returns the number of records flushed, if a flush happened.
    pub fn push(&mut self, record: BarRecord) -> PersistenceResult<Option<usize>> {
        self.append(record);

        if self.buffer.len() >= self.threshold {
            return self.try_flush().map(Some);
        }

        Ok(None)
    }

    /// Best-effort flush. Errors are logged, never returned.
    ///
    /// Returns the number of records written (0 on empty buffer or failure).
    pub fn flush(&mut self) -> usize {
        match self.try_flush() {
            Ok(count) => count,
            Err(e) => {
                error!(?e, pending = self.buffer.len(), "Error saving data");
                0
            }
        }
    }

    /// Flush the buffer to today's file.
    pub fn try_flush(&mut self) -> PersistenceResult<usize> {
        self.try_flush_on(Local::now().date_naive())
    }

    /// Flush the buffer to the file for `date`.
    ///
    /// No-op on an empty buffer. The buffer is cleared only after the rows
    /// reached the file.
    pub fn try_flush_on(&mut self, date: NaiveDate) -> PersistenceResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.path_for(date);
        let original_len = trim_partial_line(&path)?;

        let (columns, write_header) = match read_header(&path)? {
            Some(header) => {
                let dropped: Vec<String> = collect_columns(&self.buffer)
                    .into_iter()
                    .filter(|c| !header.contains(c))
                    .collect();
                if !dropped.is_empty() {
                    warn!(
                        path = %path.display(),
                        fields = ?dropped,
                        "Fields missing from existing header, not written"
                    );
                }
                (header, false)
            }
            None => (collect_columns(&self.buffer), true),
        };

        // Encode the whole batch first so the file only sees one write
        let mut wtr = csv::Writer::from_writer(Vec::new());
        if write_header {
            debug!(path = %path.display(), columns = columns.len(), "Creating daily file");
            wtr.write_record(&columns)?;
        }
        for record in &self.buffer {
            let row = columns
                .iter()
                .map(|column| cell(record.get(column)))
                .collect::<PersistenceResult<Vec<String>>>()?;
            wtr.write_record(&row)?;
        }
        let batch = wtr
            .into_inner()
            .map_err(|e| PersistenceError::Io(e.into_error()))?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Err(e) = file.write_all(&batch).and_then(|()| file.flush()) {
            // Roll back so the file holds whole batches only
            if let Err(rollback) = file.set_len(original_len) {
                error!(?rollback, path = %path.display(), "Failed to roll back partial write");
            }
            return Err(e.into());
        }

        let count = self.buffer.len();
        self.records_written += count;
        info!(count, path = %path.display(), "Saved records");

        self.buffer.clear();

        Ok(count)
    }

    /// Output file for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", self.prefix, date.format("%Y-%m-%d")))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

impl Drop for CsvBarWriter {
    fn drop(&mut self) {
        if let Err(e) = self.try_flush() {
            warn!(?e, pending = self.buffer.len(), "Failed to flush buffer on drop");
        }
    }
}

/// Field names across `records` in first-observed order.
fn collect_columns(records: &[BarRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

/// Drop a trailing line without its newline, left by an interrupted write.
///
/// Returns the file length afterwards (0 when the file does not exist).
fn trim_partial_line(path: &Path) -> PersistenceResult<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    if len == 0 || last_byte(&mut file)? == b'\n' {
        return Ok(len);
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;
    let complete = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos as u64 + 1);

    warn!(
        path = %path.display(),
        discarded_bytes = len - complete,
        "Discarding incomplete trailing line"
    );
    file.set_len(complete)?;
    Ok(complete)
}

fn last_byte(file: &mut File) -> std::io::Result<u8> {
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Header of an existing, non-empty file.
fn read_header(path: &Path) -> PersistenceResult<Option<Vec<String>>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    match rdr.records().next() {
        Some(header) => Ok(Some(header?.iter().map(str::to_string).collect())),
        None => Ok(None),
    }
}

fn cell(value: Option<&Value>) -> PersistenceResult<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(nested) => serde_json::to_string(nested)
            .map_err(|e| PersistenceError::Serialization(e.to_string())),
    }
}
