//! # Serial Communication Module
//!
//! Opens the motor driver's serial port.
//!
//! The port is configured 8N1 without flow control at one of the baud rates
//! the Sabertooth can autodetect (2400, 9600, 19200, 38400).

pub mod port_trait;

use std::path::Path;

use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use crate::error::{Result, SkidPilotError};
use port_trait::TokioSerialPort;

/// Baud rates the motor driver can autodetect.
pub const SUPPORTED_BAUD_RATES: [u32; 4] = [2400, 9600, 19200, 38400];

/// Opens the motor port.
///
/// # Errors
///
/// - [`SkidPilotError::SerialPortNotFound`] if `path` does not exist
/// - [`SkidPilotError::Serial`] if it cannot be opened or the baud rate is unsupported
///
/// # Examples
///
/// ```no_run
/// use skid_pilot::serial::open_motor_port;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let port = open_motor_port("/dev/ttyUSB0", 9600)?;
///     println!("Motors on {}", port.path());
///     Ok(())
/// }
/// ```
pub fn open_motor_port(path: &str, baud_rate: u32) -> Result<TokioSerialPort> {
    if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        return Err(SkidPilotError::Serial(format!(
            "Unsupported baud rate {} (expected one of {:?})",
            baud_rate, SUPPORTED_BAUD_RATES
        )));
    }

    if !Path::new(path).exists() {
        return Err(SkidPilotError::SerialPortNotFound(path.to_string()));
    }

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| SkidPilotError::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("Opened motor port {} at {} baud", path, baud_rate);
    Ok(TokioSerialPort::new(port, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_port_is_not_found() {
        match open_motor_port("/dev/nonexistent_serial_device_12345", 9600) {
            Err(SkidPilotError::SerialPortNotFound(path)) => {
                assert_eq!(path, "/dev/nonexistent_serial_device_12345");
            }
            other => panic!("Expected SerialPortNotFound, got: {:?}", other.map(|p| p.path().to_string())),
        }
    }

    #[test]
    fn test_unsupported_baud_rate() {
        match open_motor_port("/dev/ttyUSB0", 115_200) {
            Err(SkidPilotError::Serial(msg)) => assert!(msg.contains("115200")),
            other => panic!("Expected Serial error, got: {:?}", other.map(|p| p.path().to_string())),
        }
    }

    #[tokio::test]
    async fn test_non_serial_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_tty");
        std::fs::write(&path, b"").unwrap();

        let result = open_motor_port(path.to_str().unwrap(), 9600);
        assert!(matches!(result, Err(SkidPilotError::Serial(_))));
    }

    // Requires a Sabertooth (or any USB serial adapter) on /dev/ttyUSB0
    #[tokio::test]
    #[ignore]
    async fn test_open_with_real_hardware() {
        match open_motor_port("/dev/ttyUSB0", 9600) {
            Ok(port) => assert_eq!(port.path(), "/dev/ttyUSB0"),
            Err(e) => println!("No serial hardware detected: {}", e),
        }
    }
}
