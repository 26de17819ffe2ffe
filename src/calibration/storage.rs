//! # Calibration Storage
//!
//! Byte-addressed persistent storage for the deadzone offset.
//!
//! The storage is treated like a small EEPROM: single-byte reads and writes,
//! limited write endurance, and writes that block until they are durable.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SkidPilotError};

/// Value read from an address that was never written.
pub const UNWRITTEN_VALUE: u8 = 0;

/// Single-byte persistent storage.
#[cfg_attr(test, mockall::automock)]
pub trait CalibrationStorage {
    /// Reads the byte at `address`.
    fn read(&mut self, address: u16) -> Result<u8>;

    /// Writes `value` at `address` unless it is already there.
    ///
    /// # Returns
    ///
    /// `true` if a physical write happened.
    fn write_if_changed(&mut self, address: u16, value: u8) -> Result<bool>;
}

/// Storage backed by a small file, one byte per address.
///
/// A missing file, or an address past its end, reads as [`UNWRITTEN_VALUE`].
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates file storage at `path`. The file is created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStorage for FileStorage {
    fn read(&mut self, address: u16) -> Result<u8> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UNWRITTEN_VALUE),
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .get(usize::from(address))
            .copied()
            .unwrap_or(UNWRITTEN_VALUE))
    }

    fn write_if_changed(&mut self, address: u16, value: u8) -> Result<bool> {
        if self.read(address)? == value {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        // Pad any gap up to the address with unwritten bytes
        let mut existing = Vec::new();
        file.read_to_end(&mut existing)?;
        let address = usize::from(address);
        if existing.len() < address {
            file.seek(SeekFrom::End(0))?;
            file.write_all(&vec![UNWRITTEN_VALUE; address - existing.len()])?;
        }

        file.seek(SeekFrom::Start(address as u64))?;
        file.write_all(&[value])?;
        file.sync_all()
            .map_err(|e| SkidPilotError::Storage(format!("Failed to sync {}: {}", self.path.display(), e)))?;

        debug!("Wrote {} at address {} of {}", value, address, self.path.display());
        Ok(true)
    }
}

/// In-memory storage that counts physical writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage with `value` already at `address`.
    #[must_use]
    pub fn with_value(address: u16, value: u8) -> Self {
        let mut bytes = vec![UNWRITTEN_VALUE; usize::from(address) + 1];
        bytes[usize::from(address)] = value;
        Self { bytes, writes: 0 }
    }

    /// Number of physical writes performed.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CalibrationStorage for MemoryStorage {
    fn read(&mut self, address: u16) -> Result<u8> {
        Ok(self
            .bytes
            .get(usize::from(address))
            .copied()
            .unwrap_or(UNWRITTEN_VALUE))
    }

    fn write_if_changed(&mut self, address: u16, value: u8) -> Result<bool> {
        if self.read(address)? == value {
            return Ok(false);
        }
        let address = usize::from(address);
        if self.bytes.len() <= address {
            self.bytes.resize(address + 1, UNWRITTEN_VALUE);
        }
        self.bytes[address] = value;
        self.writes += 1;
        Ok(true)
    }
}
