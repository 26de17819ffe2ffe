//! # Curvature Steering
//!
//! Converts an acceleration command and a curve command into left and right
//! wheel speeds for a differential-drive vehicle.
//!
//! ## Algorithm
//!
//! With no curve or no acceleration both wheels run at `accel`. Otherwise a
//! curvature percent (0-100) decides how much the inner wheel gives up:
//!
//! ```text
//! p_accel     = accel / 255
//! p_curve     = curve / 255
//! dominance   = 1 - |p_accel| ^ |p_curve|
//! turn_adjust = remap(tr*|p_curve|*100 - tr*|p_accel|*50, -tr*50, tr*100, 0, tr*100)
//! combined    = dominance * 100 + turn_adjust
//! percent     = remap(combined, 0, 100 + tr*100, 0, 100)
//! percent     = trunc(f32(percent / 100) * 100)
//! inner       = remap(percent, 0, 100, accel, -accel)
//! ```
//!
//! - `percent = 0`: no turning, both wheels at `accel`
//! - `percent = 50`: inner wheel stopped
//! - `percent = 100`: inner wheel spinning backwards at full `accel`
//!
//! `dominance` shrinks as speed grows, so fast driving turns gently; the
//! `turn_adjust` term, scaled by the turn rate, sharpens turns at low speed.
//! Positive curve turns right (the right wheel is inner), negative curve
//! turns left.
//!
//! ## Usage
//!
//! ```
//! use skid_pilot::drive::steering::compute_steering;
//!
//! let steering = compute_steering(255, 255, 0.4);
//! assert_eq!(steering.curvature_percent, 18);
//! assert_eq!(steering.command.left, 255);
//! assert_eq!(steering.command.right, 164);
//! ```

use serde::Serialize;

use super::axis::{map_axis, remap_linear, COMMAND_MAX};

/// Wheel speeds sent to the motor driver, each in -255..=255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SteeringCommand {
    /// Left wheel speed; sign is direction.
    pub left: i16,
    /// Right wheel speed; sign is direction.
    pub right: i16,
}

impl SteeringCommand {
    /// Both wheels stopped.
    pub const STOP: Self = Self { left: 0, right: 0 };

    /// Builds a command, clamping each side to the motor range.
    #[must_use]
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-COMMAND_MAX, COMMAND_MAX) as i16,
            right: right.clamp(-COMMAND_MAX, COMMAND_MAX) as i16,
        }
    }

    /// Returns true when both wheels are stopped.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

/// Result of one steering computation, including the intermediates that end
/// up in the debug log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Steering {
    /// Acceleration input (-255..=255).
    pub accel: i32,
    /// Curve input (-255..=255).
    pub curve: i32,
    /// How hard the inner wheel is slowed, 0-100.
    pub curvature_percent: i32,
    /// Resulting wheel speeds.
    pub command: SteeringCommand,
}

impl Steering {
    /// Curvature as a fraction in 0.0..=1.0.
    #[must_use]
    pub fn curvature_fraction(&self) -> f32 {
        self.curvature_percent as f32 / 100.0
    }
}

/// Tunables for the drive mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringParams {
    /// Turn sharpness, 0.0-1.0.
    pub turn_rate: f32,
    /// Negate the curve (left stick X) axis.
    pub invert_curve: bool,
    /// Negate the acceleration (right stick Y) axis.
    pub invert_accel: bool,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            turn_rate: 0.4,
            invert_curve: false,
            invert_accel: true,
        }
    }
}

/// Computes wheel speeds from acceleration and curve commands.
///
/// # Arguments
///
/// * `accel` - Forward/backward command, -255..=255
/// * `curve` - Right/left command, -255..=255
/// * `turn_rate` - Turn sharpness, 0.0..=1.0
#[must_use]
pub fn compute_steering(accel: i32, curve: i32, turn_rate: f32) -> Steering {
    let accel = accel.clamp(-COMMAND_MAX, COMMAND_MAX);
    let curve = curve.clamp(-COMMAND_MAX, COMMAND_MAX);

    if accel == 0 || curve == 0 {
        return Steering {
            accel,
            curve,
            curvature_percent: 0,
            command: SteeringCommand::new(accel, accel),
        };
    }

    let percent = curvature_percent(accel, curve, turn_rate.clamp(0.0, 1.0));

    let inner_forward = remap_linear(percent, 0, 100, accel, -accel);
    let inner_reverse = -remap_linear(percent, 0, 100, -accel, accel);
    let inner = if accel > 0 { inner_forward } else { inner_reverse };

    let (left, right) = if curve > 0 { (accel, inner) } else { (inner, accel) };

    debug_assert!((-COMMAND_MAX..=COMMAND_MAX).contains(&left));
    debug_assert!((-COMMAND_MAX..=COMMAND_MAX).contains(&right));

    Steering {
        accel,
        curve,
        curvature_percent: percent,
        command: SteeringCommand::new(left, right),
    }
}

/// Curvature percent for non-zero `accel` and `curve`.
fn curvature_percent(accel: i32, curve: i32, turn_rate: f32) -> i32 {
    let p_accel = (accel as f32 / COMMAND_MAX as f32).abs();
    let p_curve = (curve as f32 / COMMAND_MAX as f32).abs();

    let dominance = 1.0 - p_accel.powf(p_curve);

    let turn_span = (turn_rate * 100.0) as i32;
    let turn_adjust = remap_linear(
        (turn_rate * p_curve * 100.0 - turn_rate * p_accel * 50.0) as i32,
        (-turn_rate * 50.0) as i32,
        turn_span,
        0,
        turn_span,
    );

    let combined = (dominance * 100.0 + turn_adjust as f32) as i32;

    let percent = remap_linear(combined, 0, (100.0 + turn_rate * 100.0) as i32, 0, 100).clamp(0, 100);

    // The wheels see the percent after a pass through an f32 fraction, which
    // truncates some values by one (53 -> 52, 59 -> 58).
    let fraction = percent as f32 / 100.0;
    (fraction * 100.0) as i32
}

/// Curvature steering bound to a set of parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteeringEngine {
    params: SteeringParams,
}

impl SteeringEngine {
    /// Creates a steering engine.
    #[must_use]
    pub fn new(params: SteeringParams) -> Self {
        Self { params }
    }

    /// Returns the configured parameters.
    #[must_use]
    pub fn params(&self) -> &SteeringParams {
        &self.params
    }

    /// Steers from raw stick bytes: right stick Y accelerates, left stick X curves.
    #[must_use]
    pub fn steer_from_sticks(&self, left_x: u8, right_y: u8) -> Steering {
        let curve = map_axis(left_x, self.params.invert_curve);
        let accel = map_axis(right_y, self.params.invert_accel);
        self.steer(accel, curve)
    }

    /// Steers from already mapped commands.
    #[must_use]
    pub fn steer(&self, accel: i32, curve: i32) -> Steering {
        compute_steering(accel, curve, self.params.turn_rate)
    }
}
