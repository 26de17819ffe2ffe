//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every key is optional; an empty file yields [`Config::default()`].

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::drive::steering::SteeringParams;
use crate::error::{Result, SkidPilotError};
use crate::mode::OperationalMode;
use crate::motors::sabertooth::{ADDRESS_MAX, ADDRESS_MIN};
use crate::serial::SUPPORTED_BAUD_RATES;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub motors: MotorConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Steering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f32,

    #[serde(default = "default_invert_left_axis")]
    pub invert_left_axis: bool,

    #[serde(default = "default_invert_right_axis")]
    pub invert_right_axis: bool,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Empty means auto-detect.
    #[serde(default)]
    pub device_path: String,

    #[serde(default)]
    pub pressure_sensing: bool,

    #[serde(default)]
    pub rumble_enabled: bool,

    #[serde(default = "default_controller_timeout_ms")]
    pub timeout_ms: u32,
}

/// Control loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u32,

    #[serde(default)]
    pub wait_period_ms: Option<u32>,

    #[serde(default)]
    pub drive_period_ms: Option<u32>,

    #[serde(default)]
    pub calibration_period_ms: Option<u32>,
}

/// Deadzone calibration persistence
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    #[serde(default)]
    pub address: u16,
}

/// Motor controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default = "default_motors_enabled")]
    pub enabled: bool,

    #[serde(default = "default_motor_port")]
    pub port: String,

    #[serde(default = "default_motor_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_motor_address")]
    pub address: u8,

    #[serde(default = "default_compensate_deadzone")]
    pub compensate_deadzone: bool,
}

/// Buzzer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_enabled")]
    pub enabled: bool,

    /// Empty means auto-detect the PC speaker.
    #[serde(default)]
    pub device_path: String,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u32,
}

// Default value functions
fn default_turn_rate() -> f32 { 0.4 }
fn default_invert_left_axis() -> bool { false }
fn default_invert_right_axis() -> bool { true }

fn default_controller_timeout_ms() -> u32 { 2000 }

fn default_cycle_period_ms() -> u32 { 50 }

fn default_storage_path() -> String { "./calibration.bin".to_string() }

fn default_motors_enabled() -> bool { true }
fn default_motor_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_motor_baud_rate() -> u32 { 9600 }
fn default_motor_address() -> u8 { 128 }
fn default_compensate_deadzone() -> bool { true }

fn default_feedback_enabled() -> bool { true }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u32 { 100 }

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            turn_rate: default_turn_rate(),
            invert_left_axis: default_invert_left_axis(),
            invert_right_axis: default_invert_right_axis(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            pressure_sensing: false,
            rumble_enabled: false,
            timeout_ms: default_controller_timeout_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: default_cycle_period_ms(),
            wait_period_ms: None,
            drive_period_ms: None,
            calibration_period_ms: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            address: 0,
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            enabled: default_motors_enabled(),
            port: default_motor_port(),
            baud_rate: default_motor_baud_rate(),
            address: default_motor_address(),
            compensate_deadzone: default_compensate_deadzone(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_feedback_enabled(),
            device_path: String::new(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl DriveConfig {
    /// Steering parameters for the drive mode.
    #[must_use]
    pub fn steering_params(&self) -> SteeringParams {
        SteeringParams {
            turn_rate: self.turn_rate,
            invert_curve: self.invert_left_axis,
            invert_accel: self.invert_right_axis,
        }
    }
}

impl TimingConfig {
    /// Cycle period for a mode, falling back to `cycle_period_ms`.
    #[must_use]
    pub fn period_for(&self, mode: OperationalMode) -> u32 {
        let specific = match mode {
            OperationalMode::Wait => self.wait_period_ms,
            OperationalMode::Drive => self.drive_period_ms,
            OperationalMode::Calibration => self.calibration_period_ms,
        };
        specific.unwrap_or(self.cycle_period_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use skid_pilot::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.drive.turn_rate) {
            return Err(invalid("turn_rate must be between 0.0 and 1.0"));
        }

        if self.controller.timeout_ms == 0 || self.controller.timeout_ms > 60000 {
            return Err(invalid("controller timeout_ms must be between 1 and 60000"));
        }

        for (name, value) in [
            ("cycle_period_ms", Some(self.timing.cycle_period_ms)),
            ("wait_period_ms", self.timing.wait_period_ms),
            ("drive_period_ms", self.timing.drive_period_ms),
            ("calibration_period_ms", self.timing.calibration_period_ms),
        ] {
            if let Some(value) = value {
                if value == 0 || value > 1000 {
                    return Err(invalid(format!("{} must be between 1 and 1000", name)));
                }
            }
        }

        if self.calibration.storage_path.is_empty() {
            return Err(invalid("calibration storage_path cannot be empty"));
        }

        if self.calibration.address > 1023 {
            return Err(invalid("calibration address must be between 0 and 1023"));
        }

        if self.motors.enabled && self.motors.port.is_empty() {
            return Err(invalid("motor port cannot be empty when motors are enabled"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.motors.baud_rate) {
            return Err(invalid("motor baud_rate must be one of: 2400, 9600, 19200, 38400"));
        }

        if !(ADDRESS_MIN..=ADDRESS_MAX).contains(&self.motors.address) {
            return Err(invalid("motor address must be between 128 and 135"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> SkidPilotError {
    SkidPilotError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.drive.turn_rate, 0.4);
        assert!(!config.drive.invert_left_axis);
        assert!(config.drive.invert_right_axis);
        assert_eq!(config.controller.timeout_ms, 2000);
        assert_eq!(config.timing.cycle_period_ms, 50);
        assert_eq!(config.motors.address, 128);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[drive]
turn_rate = 0.6
invert_right_axis = false

[controller]
timeout_ms = 1500

[timing]
drive_period_ms = 20

[motors]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.drive.turn_rate, 0.6);
        assert!(!config.drive.invert_right_axis);
        assert_eq!(config.controller.timeout_ms, 1500);
        assert!(!config.motors.enabled);
        assert_eq!(config.timing.period_for(OperationalMode::Drive), 20);
        assert_eq!(config.timing.period_for(OperationalMode::Wait), 50);
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let config = Config::from_toml(include_str!("../config/default.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.drive.turn_rate, defaults.drive.turn_rate);
        assert_eq!(config.timing.cycle_period_ms, defaults.timing.cycle_period_ms);
        assert_eq!(config.timing.drive_period_ms, None);
        assert_eq!(config.calibration.storage_path, defaults.calibration.storage_path);
        assert_eq!(config.motors.baud_rate, defaults.motors.baud_rate);
        assert_eq!(config.telemetry.max_records_per_file, defaults.telemetry.max_records_per_file);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/skid-pilot.toml");
        assert!(matches!(result, Err(SkidPilotError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(Config::from_toml("[drive\nturn_rate = ").is_err());
    }

    #[test]
    fn test_turn_rate_out_of_range() {
        let mut config = Config::default();
        config.drive.turn_rate = 1.5;
        assert!(config.validate().is_err());

        config.drive.turn_rate = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_turn_rate_bounds_are_valid() {
        let mut config = Config::default();
        config.drive.turn_rate = 0.0;
        assert!(config.validate().is_ok());
        config.drive.turn_rate = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_controller_timeout_zero() {
        let mut config = Config::default();
        config.controller.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cycle_period_zero() {
        let mut config = Config::default();
        config.timing.cycle_period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_period_override_too_high() {
        let mut config = Config::default();
        config.timing.calibration_period_ms = Some(1001);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_modes_share_default_period() {
        let timing = TimingConfig::default();
        for mode in [
            OperationalMode::Wait,
            OperationalMode::Drive,
            OperationalMode::Calibration,
        ] {
            assert_eq!(timing.period_for(mode), 50);
        }
    }

    #[test]
    fn test_empty_storage_path() {
        let mut config = Config::default();
        config.calibration.storage_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_motor_port_when_disabled() {
        let mut config = Config::default();
        config.motors.enabled = false;
        config.motors.port = String::new();
        assert!(config.validate().is_ok());

        config.motors.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.motors.baud_rate = 115200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[2400, 9600, 19200, 38400] {
            let mut config = Config::default();
            config.motors.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_motor_address_out_of_range() {
        let mut config = Config::default();
        config.motors.address = 127;
        assert!(config.validate().is_err());
        config.motors.address = 136;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_steering_params_from_drive_config() {
        let params = DriveConfig::default().steering_params();
        assert_eq!(params.turn_rate, 0.4);
        assert!(!params.invert_curve);
        assert!(params.invert_accel);
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_turn_rate(), 0.4);
        assert_eq!(default_controller_timeout_ms(), 2000);
        assert_eq!(default_cycle_period_ms(), 50);
        assert_eq!(default_storage_path(), "./calibration.bin");
        assert_eq!(default_motor_port(), "/dev/ttyUSB0");
        assert_eq!(default_motor_baud_rate(), 9600);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_interval_ms(), 100);
    }
}
