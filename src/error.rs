//! # Error Types
//!
//! Custom error types for Skid Pilot using `thiserror`.
//!
//! These cover start-up and I/O failures only. Faults that happen while the
//! vehicle is running (a missing controller, a browned-out link, a slow cycle)
//! are reported as values and degrade the vehicle to a stop instead.

use thiserror::Error;

/// Main error type for Skid Pilot
#[derive(Debug, Error)]
pub enum SkidPilotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors (motor controller link)
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No serial port could be opened
    #[error("Serial port not found, tried: {0}")]
    SerialPortNotFound(String),

    /// Buzzer errors
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// Calibration storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Telemetry logging errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for Skid Pilot
pub type Result<T> = std::result::Result<T, SkidPilotError>;
