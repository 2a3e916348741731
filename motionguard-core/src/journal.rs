//! Anomaly Journal
//!
//! Persists scoring evaluations as newline-delimited JSON, one record
//! per line. NDJSON survives truncation on power loss (at worst the
//! final line is lost) and streams straight into standard log tooling.
//! Each record is flushed as it is written; records arrive at the
//! extraction cadence (seconds apart), so buffering would only add a
//! way to lose them.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::scoring::AnomalyRecord;

/// Append-only NDJSON writer for anomaly records
pub struct AnomalyJournal {
    file: File,
    records_written: u64,
}

impl AnomalyJournal {
    /// Open or create the journal at `path`, appending to existing content
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            records_written: 0,
        })
    }

    /// Serialize one record as a JSON line and flush it to disk
    pub fn append(&mut self, record: &AnomalyRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.records_written += 1;
        Ok(())
    }

    /// Records appended through this handle
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

/// Read every parseable record from a journal file
///
/// Lines that fail to parse (e.g. a torn final line) are skipped rather
/// than failing the whole read.
pub fn read_journal<P: AsRef<Path>>(path: P) -> io::Result<Vec<AnomalyRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<AnomalyRecord>(&line) {
            records.push(record);
        }
    }
    Ok(records)
}
