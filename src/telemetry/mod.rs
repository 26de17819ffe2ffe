//! # Telemetry Module
//!
//! Records control cycles to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting each cycle as one JSON line ([`CycleRecord`])
//! - Rate limiting to one line per `log_interval_ms`
//! - Starting a new file every `max_records_per_file` records
//! - Retaining only the newest `max_files_to_keep` files
//!
//! A write failure disables the logger for the rest of the run; telemetry
//! never stops the vehicle.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::controller::ControllerFault;
use crate::error::{Result, SkidPilotError};
use crate::mode::OperationalMode;

const FILE_PREFIX: &str = "cycles_";
const FILE_EXTENSION: &str = "jsonl";

/// One control cycle as written to the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    /// Wall-clock time, RFC 3339.
    pub timestamp: String,
    /// Cycle clock, milliseconds.
    pub cycle_ms: u32,
    pub mode: OperationalMode,
    pub valid: bool,
    pub fault: Option<ControllerFault>,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
    pub accel: i32,
    pub curve: i32,
    pub curvature_percent: i32,
    pub left: i16,
    pub right: i16,
    pub offset: u8,
    pub buffer: u8,
    /// Work time of the previous cycle exceeded its period.
    pub overrun: bool,
}

impl CycleRecord {
    /// Current UTC time in the record's timestamp format.
    #[must_use]
    pub fn now_timestamp() -> String {
        Utc::now().to_rfc3339()
    }
}

/// Rotating JSONL writer.
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    log_interval_ms: u32,
    session: String,
    writer: Option<BufWriter<File>>,
    file_index: u32,
    records_in_file: usize,
    records_total: u64,
    last_logged_ms: Option<u32>,
    disabled: bool,
}

impl TelemetryLogger {
    /// Creates the log directory. No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns [`SkidPilotError::Telemetry`] if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir).map_err(|e| {
            SkidPilotError::Telemetry(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        info!("Telemetry logging to {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            log_interval_ms: config.log_interval_ms,
            session: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            writer: None,
            file_index: 0,
            records_in_file: 0,
            records_total: 0,
            last_logged_ms: None,
            disabled: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records written since creation.
    pub fn records_total(&self) -> u64 {
        self.records_total
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Writes `record` unless the interval since the last line has not passed.
    ///
    /// Errors are logged once and disable the logger.
    pub fn log(&mut self, now_ms: u32, record: &CycleRecord) {
        if self.disabled {
            return;
        }
        if let Err(e) = self.try_log(now_ms, record) {
            warn!("Telemetry disabled: {}", e);
            self.disabled = true;
            self.writer = None;
        }
    }

    /// Like [`log`](Self::log) but returns the error.
    ///
    /// # Returns
    ///
    /// `true` if a line was written.
    pub fn try_log(&mut self, now_ms: u32, record: &CycleRecord) -> Result<bool> {
        if let Some(last) = self.last_logged_ms {
            if now_ms.wrapping_sub(last) < self.log_interval_ms {
                return Ok(false);
            }
        }

        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)
            .map_err(|e| SkidPilotError::Telemetry(format!("Failed to encode record: {}", e)))?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }

        self.records_in_file += 1;
        self.records_total += 1;
        self.last_logged_ms = Some(now_ms);
        Ok(true)
    }

    /// Flushes buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.file_index += 1;
        let path = self.dir.join(format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX, self.session, self.file_index, FILE_EXTENSION
        ));
        let file = File::create(&path)?;
        debug!("Telemetry file {}", path.display());
        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.prune()
    }

    /// Deletes the oldest log files beyond `max_files_to_keep`.
    fn prune(&self) -> Result<()> {
        let mut files = log_files(&self.dir)?;
        let keep = self.max_files_to_keep;
        if files.len() <= keep {
            return Ok(());
        }
        files.sort();
        let excess = files.len() - keep;
        for old in files.into_iter().take(excess) {
            debug!("Removing old telemetry file {}", old.display());
            fs::remove_file(&old)?;
        }
        Ok(())
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Telemetry files in `dir`, unsorted.
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| {
                name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION)
            });
        if is_log {
            files.push(path);
        }
    }
    Ok(files)
}
