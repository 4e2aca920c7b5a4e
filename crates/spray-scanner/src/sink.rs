//! Result persistence.
//!
//! Accepted results go to `results.csv`, which doubles as the ground truth
//! for resume: every committed row marks its pair as done. HTTP hits are
//! also appended to a human-readable `scan.log`.

use crate::error::{Result, ScanError};
use crate::probe::ProbeOutcome;
use chrono::Local;
use serde::{Deserialize, Serialize};
use spray_core::WorkItem;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

pub const RESULTS_FILE: &str = "results.csv";
pub const LOG_FILE: &str = "scan.log";

/// Error messages that mean "nothing there" rather than "something broke".
const NON_EXISTENCE_MARKERS: &[&str] = &[
    "no such host",
    "server misbehaving",
    "connection refused",
    "network is unreachable",
    "host is down",
    "dns error",
    "failed to lookup address",
];

/// One unit selected for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub word: String,
    pub url: String,
    /// `0` when no HTTP response was received
    pub status_code: u16,
    pub content_length: i64,
    pub response_time_ms: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub error: String,
}

impl ScanResult {
    #[must_use]
    pub fn from_outcome(item: &WorkItem, outcome: &ProbeOutcome) -> Self {
        Self {
            target: item.target.clone(),
            word: item.word.clone(),
            url: outcome.url.clone(),
            status_code: outcome.status_code.unwrap_or(0),
            content_length: outcome.content_length,
            response_time_ms: outcome.response_time_ms,
            title: outcome.title.clone().unwrap_or_default(),
            error: outcome
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        }
    }

    /// Whether this row records an HTTP response rather than a failure.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.status_code > 0 && self.error.is_empty()
    }
}

/// Where accepted results are committed.
pub trait ResultSink: Send + Sync {
    /// Persist one result. Calls may come from many workers at once.
    fn write(&self, result: &ScanResult) -> Result<()>;

    /// Every result committed so far, including by earlier runs.
    fn load_committed(&self) -> Result<Vec<ScanResult>>;

    /// Whether a failed probe is worth recording.
    fn should_persist_error(&self, message: &str) -> bool {
        should_persist_error(message)
    }
}

/// Default error policy: drop name-resolution and refused/unreachable
/// failures, keep everything else (timeouts, TLS errors, resets).
#[must_use]
pub fn should_persist_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    !NON_EXISTENCE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Ensure the output directory exists and is writable; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    let fail = |reason: String| ScanError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };

    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| fail(e.to_string()))?;
        if !meta.is_dir() {
            return Err(fail("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
    }
    // Writability probe
    NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

struct CsvFiles {
    csv: csv::Writer<File>,
    log: File,
}

/// `results.csv` + `scan.log` in an output directory, appended across runs.
pub struct CsvResultSink {
    csv_path: PathBuf,
    log_path: PathBuf,
    files: Mutex<CsvFiles>,
}

impl CsvResultSink {
    /// Open (or create) the output files. Fails if the directory is unusable.
    pub fn open(out_dir: &Path) -> Result<Self> {
        ensure_output_dir(out_dir)?;

        let csv_path = out_dir.join(RESULTS_FILE);
        let log_path = out_dir.join(LOG_FILE);

        let header_needed = fs::metadata(&csv_path).map_or(true, |m| m.len() == 0);
        let csv_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .map_err(|e| ScanError::persistence(&csv_path, e))?;
        let csv = csv::WriterBuilder::new()
            .has_headers(header_needed)
            .from_writer(csv_file);

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| ScanError::persistence(&log_path, e))?;

        Ok(Self {
            csv_path,
            log_path,
            files: Mutex::new(CsvFiles { csv, log }),
        })
    }

    #[must_use]
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Parse one row leniently: only target and word are required.
    fn parse_row(record: &csv::StringRecord) -> Option<ScanResult> {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        if record.len() < 2 {
            return None;
        }
        Some(ScanResult {
            target: field(0),
            word: field(1),
            url: field(2),
            status_code: record.get(3).and_then(|v| v.parse().ok()).unwrap_or(0),
            content_length: record.get(4).and_then(|v| v.parse().ok()).unwrap_or(-1),
            response_time_ms: record.get(5).and_then(|v| v.parse().ok()).unwrap_or(0),
            title: field(6),
            error: field(7),
        })
    }
}

impl ResultSink for CsvResultSink {
    fn write(&self, result: &ScanResult) -> Result<()> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);

        files.csv.serialize(result)?;
        files
            .csv
            .flush()
            .map_err(|e| ScanError::persistence(&self.csv_path, e))?;

        if result.is_response() {
            let line = format!(
                "[{}] {} [{}] [{}] {}ms\n",
                Local::now().format("%H:%M:%S"),
                result.url,
                result.status_code,
                result.content_length,
                result.response_time_ms
            );
            files
                .log
                .write_all(line.as_bytes())
                .map_err(|e| ScanError::persistence(&self.log_path, e))?;
        }
        Ok(())
    }

    fn load_committed(&self) -> Result<Vec<ScanResult>> {
        // Make sure everything we wrote is visible to the reader below.
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .csv
            .flush()
            .map_err(|e| ScanError::persistence(&self.csv_path, e))?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(&self.csv_path)?;

        let mut results = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) => results.extend(Self::parse_row(&record)),
                Err(e) => tracing::debug!("Skipping unreadable result row: {}", e),
            }
        }
        Ok(results)
    }
}
