//! # Drive Module
//!
//! Turns joystick axes into differential wheel speeds.
//!
//! This module handles:
//! - Mapping raw 0-255 stick bytes to signed motor commands
//! - Curvature steering from an accelerate axis and a curve axis

pub mod axis;
pub mod steering;
