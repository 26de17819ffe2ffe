//! # Sony Gamepad over evdev
//!
//! Finds a Sony gamepad through the Linux evdev interface and polls it once
//! per control cycle.
//!
//! ## Controller Detection
//!
//! Sony controllers are identified by vendor ID 0x054c. A DualSense exposes
//! several event nodes (gamepad, motion sensors, touchpad) with the same IDs,
//! so only nodes that report both sticks and face buttons are considered.
//!
//! | Product ID | Controller |
//! |------------|------------|
//! | 0x05c4, 0x09cc | DualShock 4 |
//! | 0x0ce6 | DualSense |
//! | 0x0df2 | DualSense Edge |
//!
//! Any other Sony gamepad node is reported as unsupported.
//!
//! ## Polling
//!
//! Each [`read`](Gamepad::read) queries the current key and axis state
//! directly (no event queue), so a cycle never blocks waiting for input.
//!
//! | Sample | evdev axis |
//! |--------|------------|
//! | lx | ABS_X |
//! | ly | ABS_Y |
//! | rx | ABS_Z |
//! | ry | ABS_RZ |
//!
//! The d-pad arrives as the ABS_HAT0X / ABS_HAT0Y axes and is folded into
//! the button set.

use evdev::{AbsoluteAxisType, AttributeSetRef, Device, FFEffectType, Key};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{
    Button, Buttons, ControllerKind, DeviceStatus, Gamepad, GamepadFrame, JoystickSample,
    LinkStatus,
};
use crate::config::ControllerConfig;

/// Sony vendor ID
const SONY_VENDOR_ID: u16 = 0x054c;

/// DualShock 4 product IDs (v1 and v2)
const DUALSHOCK4_PRODUCT_IDS: [u16; 2] = [0x05c4, 0x09cc];

/// DualSense product ID (wired and Bluetooth)
const DUALSENSE_PRODUCT_ID: u16 = 0x0ce6;

/// DualSense Edge product ID
const DUALSENSE_EDGE_PRODUCT_ID: u16 = 0x0df2;

/// Directory scanned for event devices
const INPUT_DIR: &str = "/dev/input";

/// evdev key codes for each digital button.
const BUTTON_KEYS: [(Key, Button); 12] = [
    (Key::BTN_SOUTH, Button::Cross),
    (Key::BTN_EAST, Button::Circle),
    (Key::BTN_WEST, Button::Square),
    (Key::BTN_NORTH, Button::Triangle),
    (Key::BTN_TL, Button::L1),
    (Key::BTN_TR, Button::R1),
    (Key::BTN_TL2, Button::L2),
    (Key::BTN_TR2, Button::R2),
    (Key::BTN_THUMBL, Button::L3),
    (Key::BTN_THUMBR, Button::R3),
    (Key::BTN_SELECT, Button::Select),
    (Key::BTN_START, Button::Start),
];

/// Classifies a Sony product ID.
#[must_use]
pub fn classify_product(product: u16) -> ControllerKind {
    match product {
        DUALSENSE_PRODUCT_ID => ControllerKind::DualSense,
        DUALSENSE_EDGE_PRODUCT_ID => ControllerKind::DualSenseEdge,
        p if DUALSHOCK4_PRODUCT_IDS.contains(&p) => ControllerKind::DualShock4,
        other => ControllerKind::Unsupported(other),
    }
}

/// Converts an evdev axis value to a stick byte.
#[must_use]
pub fn axis_byte(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Builds the button set from the key state and d-pad hat axes.
#[must_use]
pub fn buttons_from_state(keys: &AttributeSetRef<Key>, hat_x: i32, hat_y: i32) -> Buttons {
    let mut buttons = Buttons::NONE;
    for (key, button) in BUTTON_KEYS {
        buttons.set(button, keys.contains(key));
    }
    buttons.set(Button::PadLeft, hat_x < 0);
    buttons.set(Button::PadRight, hat_x > 0);
    buttons.set(Button::PadUp, hat_y < 0);
    buttons.set(Button::PadDown, hat_y > 0);
    buttons
}

/// Whether an event node is the gamepad part of a controller.
fn is_gamepad_node(device: &Device) -> bool {
    let has_sticks = device
        .supported_absolute_axes()
        .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));
    let has_buttons = device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));
    has_sticks && has_buttons
}

/// Sony gamepad handle.
///
/// Starts disconnected; call [`Gamepad::configure`] to find a controller.
pub struct DualSenseGamepad {
    device: Option<Device>,
    device_path: Option<String>,
    /// Fixed device path; empty means scan.
    configured_path: String,
    pressure_sensing: bool,
    rumble_enabled: bool,
    previous: Buttons,
}

impl std::fmt::Debug for DualSenseGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualSenseGamepad")
            .field("device_path", &self.device_path)
            .field("configured_path", &self.configured_path)
            .finish_non_exhaustive()
    }
}

impl DualSenseGamepad {
    /// Creates an unconfigured gamepad from the controller configuration.
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            device: None,
            device_path: None,
            configured_path: config.device_path.clone(),
            pressure_sensing: config.pressure_sensing,
            rumble_enabled: config.rumble_enabled,
            previous: Buttons::NONE,
        }
    }

    /// The event device currently in use, if any.
    pub fn device_path(&self) -> Option<&str> {
        self.device_path.as_deref()
    }

    /// Opens the configured path, or scans `/dev/input` for a Sony gamepad.
    fn find_device(&self) -> Option<(Device, String)> {
        if !self.configured_path.is_empty() {
            return match Device::open(&self.configured_path) {
                Ok(device) => Some((device, self.configured_path.clone())),
                Err(e) => {
                    debug!("Could not open {}: {}", self.configured_path, e);
                    None
                }
            };
        }

        let input_dir = Path::new(INPUT_DIR);
        let mut entries: Vec<_> = match std::fs::read_dir(input_dir) {
            Ok(dir) => dir.filter_map(|entry| entry.ok()).map(|entry| entry.path()).collect(),
            Err(e) => {
                debug!("Failed to read {}: {}", INPUT_DIR, e);
                return None;
            }
        };

        // Sort for deterministic selection when several controllers are connected
        entries.sort();

        for path in entries {
            let is_event_node = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if id.vendor() == SONY_VENDOR_ID && is_gamepad_node(&device) {
                        return Some((device, path.to_string_lossy().to_string()));
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        None
    }

    fn poll(&self, device: &Device) -> std::io::Result<(JoystickSample, Buttons)> {
        let abs = device.get_abs_state()?;
        let keys = device.get_key_state()?;

        let value = |axis: AbsoluteAxisType| abs[axis.0 as usize].value;

        let sample = JoystickSample::new(
            axis_byte(value(AbsoluteAxisType::ABS_X)),
            axis_byte(value(AbsoluteAxisType::ABS_Y)),
            axis_byte(value(AbsoluteAxisType::ABS_Z)),
            axis_byte(value(AbsoluteAxisType::ABS_RZ)),
        );
        let buttons = buttons_from_state(
            &keys,
            value(AbsoluteAxisType::ABS_HAT0X),
            value(AbsoluteAxisType::ABS_HAT0Y),
        );

        Ok((sample, buttons))
    }
}

impl Gamepad for DualSenseGamepad {
    fn configure(&mut self) -> DeviceStatus {
        self.device = None;
        self.device_path = None;
        self.previous = Buttons::NONE;

        let Some((device, path)) = self.find_device() else {
            info!("No controller found");
            return DeviceStatus::NOT_FOUND;
        };

        let kind = classify_product(device.input_id().product());

        let link = if let Err(e) = device.get_key_state() {
            warn!("Controller at {} found but not accepting commands: {}", path, e);
            LinkStatus::NotAcceptingCommands
        } else if self.pressure_sensing {
            // Sony evdev drivers expose no per-button pressure axes
            warn!("Controller refusing to enter pressures mode, may not support it");
            LinkStatus::PressuresRefused
        } else {
            LinkStatus::Configured
        };

        if self.rumble_enabled {
            let rumble = device
                .supported_ff()
                .map_or(false, |ff| ff.contains(FFEffectType::FF_RUMBLE));
            if !rumble {
                warn!("Rumble requested but {} does not support it", path);
            }
        }

        info!("Found {} controller at {}", kind, path);
        if let ControllerKind::Unsupported(_) = kind {
            warn!("This controller is not supported!");
        }

        self.device = Some(device);
        self.device_path = Some(path);

        DeviceStatus { link, kind }
    }

    fn read(&mut self) -> GamepadFrame {
        let Some(device) = self.device.as_ref() else {
            return GamepadFrame::DISCONNECTED;
        };

        match self.poll(device) {
            Ok((sample, held)) => {
                let just_pressed = held.newly_pressed_since(self.previous);
                self.previous = held;
                GamepadFrame {
                    sample,
                    held,
                    just_pressed,
                }
            }
            Err(e) => {
                debug!("Failed to poll controller: {}", e);
                self.previous = Buttons::NONE;
                GamepadFrame::DISCONNECTED
            }
        }
    }
}
