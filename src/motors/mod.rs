//! # Motor Output
//!
//! Two independent wheel channels, each taking a signed speed in
//! -255..=255 where the sign is the direction.
//!
//! - [`sabertooth::SabertoothDriver`]: dual motor driver on a serial port
//! - [`DryRunMotors`]: logs commands only
//!
//! [`compensate_deadzone`] lifts small commands past the speed at which the
//! motors actually start turning.

pub mod sabertooth;

use async_trait::async_trait;
use tracing::trace;

use crate::drive::axis::COMMAND_MAX;
use crate::drive::steering::SteeringCommand;
use crate::error::Result;

/// A pair of wheel motors.
#[async_trait]
pub trait MotorOutput: Send {
    /// Sets both wheel speeds, each in -255..=255.
    async fn drive(&mut self, left: i16, right: i16) -> Result<()>;

    /// Stops both wheels.
    async fn stop(&mut self) -> Result<()> {
        self.drive(0, 0).await
    }
}

#[async_trait]
impl<M: MotorOutput + ?Sized> MotorOutput for Box<M> {
    async fn drive(&mut self, left: i16, right: i16) -> Result<()> {
        (**self).drive(left, right).await
    }

    async fn stop(&mut self) -> Result<()> {
        (**self).stop().await
    }
}

/// Motors that only log what they would have done.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunMotors {
    last: SteeringCommand,
    commands: u64,
}

impl DryRunMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last command received.
    pub fn last(&self) -> SteeringCommand {
        self.last
    }

    /// Number of commands received.
    pub fn commands(&self) -> u64 {
        self.commands
    }
}

#[async_trait]
impl MotorOutput for DryRunMotors {
    async fn drive(&mut self, left: i16, right: i16) -> Result<()> {
        trace!("Motors (dry run): left {} right {}", left, right);
        self.last = SteeringCommand::new(i32::from(left), i32::from(right));
        self.commands += 1;
        Ok(())
    }
}

/// Rescales a non-zero speed into `offset..=255` keeping its sign.
///
/// Zero stays zero, so a centered stick still stops the wheel.
///
/// # Examples
///
/// ```
/// use skid_pilot::motors::compensate_deadzone;
///
/// assert_eq!(compensate_deadzone(0, 60), 0);
/// assert_eq!(compensate_deadzone(1, 60), 60);
/// assert_eq!(compensate_deadzone(-255, 60), -255);
/// ```
#[must_use]
pub fn compensate_deadzone(speed: i16, offset: u8) -> i16 {
    if speed == 0 {
        return 0;
    }
    let magnitude = i32::from(speed).abs().min(COMMAND_MAX);
    let offset = i32::from(offset);
    let lifted = offset + magnitude * (COMMAND_MAX - offset) / COMMAND_MAX;
    (lifted * i32::from(speed).signum()) as i16
}

/// Applies [`compensate_deadzone`] to both sides of a command.
#[must_use]
pub fn compensate_command(command: SteeringCommand, offset: u8) -> SteeringCommand {
    SteeringCommand {
        left: compensate_deadzone(command.left, offset),
        right: compensate_deadzone(command.right, offset),
    }
}
