//! # Calibration Module
//!
//! Owns the motor deadzone offset and the working buffer edited in
//! calibration mode.
//!
//! ## Offset and Buffer
//!
//! - The **offset** is the active deadzone compensation (0-255). It is read
//!   from storage once at boot.
//! - The **buffer** is a scratch copy edited in calibration mode. It is reset
//!   to the offset whenever calibration mode is entered and only replaces the
//!   offset when explicitly adopted.
//!
//! ## Persistence
//!
//! [`CalibrationStore::commit`] writes only when the value differs from what
//! storage already holds, so repeated commits cost at most one write.
//!
//! ## Usage
//!
//! ```
//! use skid_pilot::calibration::{AdjustDirection, CalibrationStore, StepSize};
//! use skid_pilot::calibration::storage::MemoryStorage;
//!
//! let mut store = CalibrationStore::new(MemoryStorage::with_value(0, 250), 0);
//! store.load();
//! store.adjust(AdjustDirection::Increase, StepSize::Coarse);
//! assert_eq!(store.buffer(), 255);
//! ```

pub mod storage;

use tracing::{info, warn};

use crate::error::Result;
use storage::{CalibrationStorage, UNWRITTEN_VALUE};

/// Which way a buffer edit goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustDirection {
    Increase,
    Decrease,
}

/// Size of a buffer edit, picked by the modifier buttons held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSize {
    /// 15 per press.
    Coarse,
    /// 5 per press.
    Medium,
    /// 1 per press.
    Fine,
}

impl StepSize {
    /// Amount added or removed per edit.
    #[must_use]
    pub const fn amount(self) -> u8 {
        match self {
            StepSize::Coarse => 15,
            StepSize::Medium => 5,
            StepSize::Fine => 1,
        }
    }

    /// Picks the tier from the held modifiers; coarse wins over fine.
    #[must_use]
    pub const fn from_modifiers(coarse: bool, fine: bool) -> Self {
        if coarse {
            StepSize::Coarse
        } else if fine {
            StepSize::Fine
        } else {
            StepSize::Medium
        }
    }
}

/// Deadzone offset, its edit buffer, and the storage behind them.
#[derive(Debug)]
pub struct CalibrationStore<S> {
    storage: S,
    address: u16,
    offset: u8,
    buffer: u8,
    /// Value known to be in storage.
    stored: u8,
}

impl<S: CalibrationStorage> CalibrationStore<S> {
    /// Creates a store for the byte at `address`. Call [`load`](Self::load)
    /// before use.
    pub fn new(storage: S, address: u16) -> Self {
        Self {
            storage,
            address,
            offset: UNWRITTEN_VALUE,
            buffer: UNWRITTEN_VALUE,
            stored: UNWRITTEN_VALUE,
        }
    }

    /// Reads the persisted offset and seeds the buffer with it.
    ///
    /// A storage failure is logged and leaves the offset at zero.
    pub fn load(&mut self) -> u8 {
        let value = match self.storage.read(self.address) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read calibration, using {}: {}", UNWRITTEN_VALUE, e);
                UNWRITTEN_VALUE
            }
        };
        info!("Loaded deadzone offset {}", value);
        self.offset = value;
        self.buffer = value;
        self.stored = value;
        value
    }

    /// Active deadzone offset.
    #[must_use]
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Working buffer.
    #[must_use]
    pub fn buffer(&self) -> u8 {
        self.buffer
    }

    /// Value last read from or written to storage.
    #[must_use]
    pub fn stored(&self) -> u8 {
        self.stored
    }

    /// Discards buffer edits, restoring the active offset.
    pub fn reset_buffer(&mut self) {
        self.buffer = self.offset;
    }

    /// Overwrites the buffer.
    pub fn set_buffer(&mut self, value: u8) {
        self.buffer = value;
    }

    /// Moves the buffer by one step, clamped to 0-255.
    pub fn adjust(&mut self, direction: AdjustDirection, step: StepSize) -> u8 {
        self.buffer = match direction {
            AdjustDirection::Increase => self.buffer.saturating_add(step.amount()),
            AdjustDirection::Decrease => self.buffer.saturating_sub(step.amount()),
        };
        self.buffer
    }

    /// Makes the buffer the active offset.
    ///
    /// # Returns
    ///
    /// `true` if the offset changed.
    pub fn adopt_buffer(&mut self) -> bool {
        if self.buffer == self.offset {
            return false;
        }
        info!("Using new deadzone offset {} (was {})", self.buffer, self.offset);
        self.offset = self.buffer;
        true
    }

    /// Persists `value` unless storage already holds it.
    ///
    /// # Returns
    ///
    /// `true` if storage was written.
    ///
    /// # Errors
    ///
    /// Returns the storage error; the cached stored value is left unchanged.
    pub fn commit(&mut self, value: u8) -> Result<bool> {
        if value == self.stored {
            info!("No new calibration data to write");
            return Ok(false);
        }
        let written = self.storage.write_if_changed(self.address, value)?;
        self.stored = value;
        if written {
            info!("Wrote deadzone offset {} to storage", value);
        }
        Ok(written)
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::storage::{MemoryStorage, MockCalibrationStorage};
    use super::*;
    use crate::error::SkidPilotError;

    fn loaded(value: u8) -> CalibrationStore<MemoryStorage> {
        let mut store = CalibrationStore::new(MemoryStorage::with_value(0, value), 0);
        store.load();
        store
    }

    #[test]
    fn test_load_seeds_offset_and_buffer() {
        let store = loaded(37);
        assert_eq!(store.offset(), 37);
        assert_eq!(store.buffer(), 37);
        assert_eq!(store.stored(), 37);
    }

    #[test]
    fn test_load_failure_falls_back_to_zero() {
        let mut storage = MockCalibrationStorage::new();
        storage
            .expect_read()
            .returning(|_| Err(SkidPilotError::Storage("bad sector".to_string())));
        let mut store = CalibrationStore::new(storage, 0);
        assert_eq!(store.load(), 0);
        assert_eq!(store.offset(), 0);
    }

    #[test]
    fn test_step_sizes() {
        assert_eq!(StepSize::Coarse.amount(), 15);
        assert_eq!(StepSize::Medium.amount(), 5);
        assert_eq!(StepSize::Fine.amount(), 1);
        assert_eq!(StepSize::from_modifiers(true, true), StepSize::Coarse);
        assert_eq!(StepSize::from_modifiers(false, true), StepSize::Fine);
        assert_eq!(StepSize::from_modifiers(false, false), StepSize::Medium);
    }

    #[test]
    fn test_coarse_increase_clamps_at_255() {
        let mut store = loaded(0);
        store.set_buffer(250);
        assert_eq!(store.adjust(AdjustDirection::Increase, StepSize::Coarse), 255);
    }

    #[test]
    fn test_repeated_decrease_clamps_at_zero() {
        let mut store = loaded(7);
        for _ in 0..10 {
            store.adjust(AdjustDirection::Decrease, StepSize::Medium);
        }
        assert_eq!(store.buffer(), 0);
    }

    #[test]
    fn test_repeated_increase_clamps_at_255() {
        let mut store = loaded(200);
        for _ in 0..50 {
            store.adjust(AdjustDirection::Increase, StepSize::Coarse);
        }
        assert_eq!(store.buffer(), 255);
        store.adjust(AdjustDirection::Decrease, StepSize::Fine);
        assert_eq!(store.buffer(), 254);
    }

    #[test]
    fn test_reset_buffer_restores_offset() {
        let mut store = loaded(20);
        store.adjust(AdjustDirection::Increase, StepSize::Coarse);
        assert_eq!(store.buffer(), 35);
        store.reset_buffer();
        assert_eq!(store.buffer(), 20);
    }

    #[test]
    fn test_adopt_buffer() {
        let mut store = loaded(20);
        assert!(!store.adopt_buffer());
        store.adjust(AdjustDirection::Increase, StepSize::Fine);
        assert!(store.adopt_buffer());
        assert_eq!(store.offset(), 21);
        // Adoption alone does not persist
        assert_eq!(store.stored(), 20);
        assert_eq!(store.storage().writes(), 0);
    }

    #[test]
    fn test_commit_unchanged_value_never_touches_storage() {
        let mut storage = MockCalibrationStorage::new();
        storage.expect_read().times(1).returning(|_| Ok(10));
        storage.expect_write_if_changed().times(0);

        let mut store = CalibrationStore::new(storage, 0);
        store.load();
        store.set_buffer(10);
        assert!(!store.commit(store.buffer()).unwrap());
    }

    #[test]
    fn test_repeated_commit_writes_once() {
        let mut store = loaded(10);
        store.set_buffer(42);
        assert!(store.commit(42).unwrap());
        assert!(!store.commit(42).unwrap());
        assert!(!store.commit(42).unwrap());
        assert_eq!(store.storage().writes(), 1);
        assert_eq!(store.stored(), 42);
    }

    #[test]
    fn test_commit_error_keeps_stored_value() {
        let mut storage = MockCalibrationStorage::new();
        storage.expect_read().returning(|_| Ok(5));
        storage
            .expect_write_if_changed()
            .times(1)
            .returning(|_, _| Err(SkidPilotError::Storage("read-only".to_string())));

        let mut store = CalibrationStore::new(storage, 3);
        store.load();
        assert!(store.commit(9).is_err());
        assert_eq!(store.stored(), 5);
    }
}
