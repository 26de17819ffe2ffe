//! # Axis Mapper
//!
//! Maps raw 8-bit stick positions to signed motor commands.
//!
//! ## Value Ranges
//!
//! - Raw stick input: 0-255, center at 128
//! - Motor command: -255 to 255, 0 = stopped
//!
//! Off center the stick is scaled by two around the middle of the byte range,
//! `2 * raw - 255`, so both ends land exactly on full power. The center byte
//! is pinned to 0; its neighbours sit just off it at -1 and 3:
//!
//! | Raw | Output | Inverted |
//! |-----|--------|----------|
//! | 0   | -255   | 255      |
//! | 127 | -1     | 1        |
//! | 128 | 0      | 0        |
//! | 129 | 3      | -3       |
//! | 255 | 255    | -255     |
//!
//! ## Usage
//!
//! ```
//! use skid_pilot::drive::axis::map_axis;
//!
//! assert_eq!(map_axis(0, false), -255);
//! assert_eq!(map_axis(128, true), 0);
//! assert_eq!(map_axis(255, false), 255);
//! ```

/// Raw axis center value.
pub const AXIS_CENTER: u8 = 128;

/// Full-scale motor command.
pub const COMMAND_MAX: i32 = 255;

/// Integer linear interpolation with truncation toward zero.
///
/// Computes `to_low + (x - from_low) * (to_high - to_low) / (from_high - from_low)`.
/// A degenerate source range returns `to_low`.
///
/// # Examples
///
/// ```
/// use skid_pilot::drive::axis::remap_linear;
///
/// assert_eq!(remap_linear(50, 0, 100, 0, 10), 5);
/// assert_eq!(remap_linear(20, -20, 40, 0, 40), 26);
/// assert_eq!(remap_linear(7, 3, 3, 1, 9), 1);
/// ```
#[must_use]
pub fn remap_linear(x: i32, from_low: i32, from_high: i32, to_low: i32, to_high: i32) -> i32 {
    let span = from_high - from_low;
    if span == 0 {
        return to_low;
    }
    (x - from_low) * (to_high - to_low) / span + to_low
}

/// Maps a raw stick byte to a signed motor command.
///
/// # Arguments
///
/// * `raw` - Stick position (0-255, 128 = center)
/// * `invert` - Negate the result (for axes mounted upside down)
///
/// # Returns
///
/// Motor command in -255..=255. Monotonic in `raw`, 0 at center regardless
/// of `invert`.
#[must_use]
pub fn map_axis(raw: u8, invert: bool) -> i32 {
    if raw == AXIS_CENTER {
        return 0;
    }
    let mapped = 2 * i32::from(raw) - COMMAND_MAX;

    if invert {
        -mapped
    } else {
        mapped
    }
}
