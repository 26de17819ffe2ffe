//! # Sabertooth Packetized Serial
//!
//! Drives a Dimension Engineering Sabertooth dual motor driver in packetized
//! serial mode.
//!
//! ## Packet Structure
//!
//! ```text
//! [ADDRESS] [COMMAND] [DATA] [CHECKSUM]
//!   1 byte    1 byte   1 byte   1 byte
//! ```
//!
//! - **Address**: 128-135, set by the DIP switches
//! - **Command**: 0/1 motor 1 forward/backward, 4/5 motor 2 forward/backward
//! - **Data**: speed 0-127
//! - **Checksum**: `(address + command + data) & 0x7F`
//!
//! The driver learns the baud rate from a single `0xAA` byte sent before the
//! first packet. The left wheel is motor 1, the right wheel motor 2.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use super::MotorOutput;
use crate::drive::axis::COMMAND_MAX;
use crate::error::{Result, SkidPilotError};
use crate::serial::port_trait::SerialPortIO;

/// Baud rate detection byte
pub const AUTOBAUD_BYTE: u8 = 0xAA;

/// Lowest valid packet address
pub const ADDRESS_MIN: u8 = 128;

/// Highest valid packet address
pub const ADDRESS_MAX: u8 = 135;

pub const CMD_MOTOR1_FORWARD: u8 = 0;
pub const CMD_MOTOR1_BACKWARD: u8 = 1;
pub const CMD_MOTOR2_FORWARD: u8 = 4;
pub const CMD_MOTOR2_BACKWARD: u8 = 5;

/// Maximum speed in a packet
pub const DATA_MAX: u8 = 127;

/// Size of one packet
pub const PACKET_SIZE: usize = 4;

/// Motor channel on the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    /// Left wheel.
    One,
    /// Right wheel.
    Two,
}

/// Packet checksum.
#[must_use]
pub fn checksum(address: u8, command: u8, data: u8) -> u8 {
    (address.wrapping_add(command).wrapping_add(data)) & 0x7F
}

/// Scales a -255..=255 wheel speed to a command byte and 0..=127 data byte.
#[must_use]
pub fn speed_to_command(motor: Motor, speed: i16) -> (u8, u8) {
    let magnitude = i32::from(speed).abs().min(COMMAND_MAX);
    let data = (magnitude * i32::from(DATA_MAX) / COMMAND_MAX) as u8;
    let command = match (motor, speed < 0) {
        (Motor::One, false) => CMD_MOTOR1_FORWARD,
        (Motor::One, true) => CMD_MOTOR1_BACKWARD,
        (Motor::Two, false) => CMD_MOTOR2_FORWARD,
        (Motor::Two, true) => CMD_MOTOR2_BACKWARD,
    };
    (command, data)
}

/// Appends one motor packet to `buf`.
pub fn encode_motor_packet(buf: &mut BytesMut, address: u8, motor: Motor, speed: i16) {
    let (command, data) = speed_to_command(motor, speed);
    buf.reserve(PACKET_SIZE);
    buf.put_u8(address);
    buf.put_u8(command);
    buf.put_u8(data);
    buf.put_u8(checksum(address, command, data));
}

/// Encodes packets for both motors, motor 1 first.
#[must_use]
pub fn encode_drive_frame(address: u8, left: i16, right: i16) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2 * PACKET_SIZE);
    encode_motor_packet(&mut buf, address, Motor::One, left);
    encode_motor_packet(&mut buf, address, Motor::Two, right);
    buf
}

/// Sabertooth driver on a serial port.
pub struct SabertoothDriver<P> {
    port: P,
    address: u8,
    autobaud_sent: bool,
}

impl<P> std::fmt::Debug for SabertoothDriver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SabertoothDriver")
            .field("address", &self.address)
            .field("autobaud_sent", &self.autobaud_sent)
            .finish_non_exhaustive()
    }
}

impl<P: SerialPortIO> SabertoothDriver<P> {
    /// Creates a driver for the unit at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`SkidPilotError::Serial`] if the address is outside 128-135.
    pub fn new(port: P, address: u8) -> Result<Self> {
        if !(ADDRESS_MIN..=ADDRESS_MAX).contains(&address) {
            return Err(SkidPilotError::Serial(format!(
                "Sabertooth address {} outside {}-{}",
                address, ADDRESS_MIN, ADDRESS_MAX
            )));
        }
        Ok(Self {
            port,
            address,
            autobaud_sent: false,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Sends the autobaud byte if it has not been sent yet.
    pub async fn start(&mut self) -> Result<()> {
        if self.autobaud_sent {
            return Ok(());
        }
        self.write(&[AUTOBAUD_BYTE]).await?;
        self.autobaud_sent = true;
        info!("Sabertooth at address {} initialised", self.address);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .await
            .map_err(|e| SkidPilotError::Serial(format!("Failed to write packet: {}", e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| SkidPilotError::Serial(format!("Failed to flush serial port: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl<P: SerialPortIO> MotorOutput for SabertoothDriver<P> {
    async fn drive(&mut self, left: i16, right: i16) -> Result<()> {
        self.start().await?;
        let frame = encode_drive_frame(self.address, left, right);
        self.write(&frame).await?;
        debug!("Sent motor frame left {} right {}", left, right);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use std::io;

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(128, 0, 64), (128 + 64) & 0x7F);
        assert_eq!(checksum(135, 5, 127), ((135u16 + 5 + 127) & 0x7F) as u8);
    }

    #[test]
    fn test_speed_scaling() {
        assert_eq!(speed_to_command(Motor::One, 255), (CMD_MOTOR1_FORWARD, 127));
        assert_eq!(speed_to_command(Motor::One, -255), (CMD_MOTOR1_BACKWARD, 127));
        assert_eq!(speed_to_command(Motor::Two, 128), (CMD_MOTOR2_FORWARD, 63));
        assert_eq!(speed_to_command(Motor::Two, -1), (CMD_MOTOR2_BACKWARD, 0));
        assert_eq!(speed_to_command(Motor::Two, 0), (CMD_MOTOR2_FORWARD, 0));
    }

    #[test]
    fn test_drive_frame_layout() {
        let frame = encode_drive_frame(128, 255, -255);
        assert_eq!(frame.len(), 8);
        assert_eq!(&frame[..4], &[128, 0, 127, 127]);
        assert_eq!(&frame[4..], &[128, 5, 127, (128u16 + 5 + 127) as u8 & 0x7F]);
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(SabertoothDriver::new(MockSerialPort::new(), 127).is_err());
        assert!(SabertoothDriver::new(MockSerialPort::new(), 136).is_err());
        assert!(SabertoothDriver::new(MockSerialPort::new(), 130).is_ok());
    }

    #[tokio::test]
    async fn test_autobaud_sent_once() {
        let port = MockSerialPort::new();
        let mut driver = SabertoothDriver::new(port.clone(), 128).unwrap();

        driver.drive(100, 100).await.unwrap();
        driver.stop().await.unwrap();

        let frames = port.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![AUTOBAUD_BYTE]);
        assert_eq!(frames[1], encode_drive_frame(128, 100, 100).to_vec());
        assert_eq!(frames[2], vec![128, 0, 0, 0, 128, 4, 0, 4]);
    }

    #[tokio::test]
    async fn test_write_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        let mut driver = SabertoothDriver::new(port, 128).unwrap();

        match driver.drive(10, 10).await {
            Err(SkidPilotError::Serial(msg)) => assert!(msg.contains("Failed to write")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flush_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_flush_error(io::ErrorKind::TimedOut);
        let mut driver = SabertoothDriver::new(port, 128).unwrap();

        match driver.start().await {
            Err(SkidPilotError::Serial(msg)) => assert!(msg.contains("Failed to flush")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }
}
