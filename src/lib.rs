//! # Skid Pilot Library
//!
//! Drive a two-wheeled skid-steer vehicle from a dual-analog gamepad.
//!
//! This library provides the pieces of the vehicle's control loop: curvature
//! steering, the wait/drive/calibration mode machine, controller health
//! checks, deadzone calibration storage, and the fixed-period scheduler,
//! along with the Linux gamepad, buzzer and Sabertooth motor driver they
//! talk to.

pub mod calibration;
pub mod config;
pub mod controller;
pub mod drive;
pub mod error;
pub mod feedback;
pub mod mode;
pub mod motors;
pub mod scheduler;
pub mod serial;
pub mod telemetry;
pub mod vehicle;
