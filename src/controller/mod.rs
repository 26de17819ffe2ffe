//! # Controller Module
//!
//! Dual-analog gamepad input.
//!
//! This module handles:
//! - The per-cycle joystick sample and button state ([`GamepadFrame`])
//! - The [`Gamepad`] device abstraction (configure + poll)
//! - A Linux evdev implementation for Sony controllers ([`dualsense`])
//! - Link health validation and rediscovery ([`watchdog`])
//!
//! Button edges ("just pressed") are produced by the device implementation;
//! the rest of the crate only asks for them.

pub mod dualsense;
pub mod watchdog;

use std::fmt;

use serde::Serialize;

/// One cycle's analog stick reading, raw bytes with 128 at center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickSample {
    /// Left stick X (curve).
    pub lx: u8,
    /// Left stick Y.
    pub ly: u8,
    /// Right stick X.
    pub rx: u8,
    /// Right stick Y (acceleration).
    pub ry: u8,
}

impl JoystickSample {
    /// All sticks centered.
    pub const CENTERED: Self = Self::uniform(128);

    /// What an unreadable link produces: every channel pinned low.
    pub const DISCONNECTED: Self = Self::uniform(0);

    /// Creates a sample.
    #[must_use]
    pub const fn new(lx: u8, ly: u8, rx: u8, ry: u8) -> Self {
        Self { lx, ly, rx, ry }
    }

    /// Creates a sample with every channel at `value`.
    #[must_use]
    pub const fn uniform(value: u8) -> Self {
        Self::new(value, value, value, value)
    }

    /// The four channels in lx, ly, rx, ry order.
    #[must_use]
    pub fn channels(&self) -> [u8; 4] {
        [self.lx, self.ly, self.rx, self.ry]
    }
}

impl Default for JoystickSample {
    fn default() -> Self {
        Self::CENTERED
    }
}

/// Digital gamepad buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    L3,
    R3,
    Select,
    Start,
    PadUp,
    PadDown,
    PadLeft,
    PadRight,
}

impl Button {
    /// Every button, in bit order.
    pub const ALL: [Button; 16] = [
        Button::Cross,
        Button::Circle,
        Button::Square,
        Button::Triangle,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::L3,
        Button::R3,
        Button::Select,
        Button::Start,
        Button::PadUp,
        Button::PadDown,
        Button::PadLeft,
        Button::PadRight,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of buttons packed into a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Buttons(u16);

impl Buttons {
    /// No buttons.
    pub const NONE: Self = Self(0);

    /// Builds a set from a list of buttons.
    #[must_use]
    pub fn from_slice(buttons: &[Button]) -> Self {
        buttons.iter().fold(Self::NONE, |set, &b| set.with(b))
    }

    /// Returns the set with `button` added.
    #[must_use]
    pub const fn with(self, button: Button) -> Self {
        Self(self.0 | button.bit())
    }

    /// Adds or removes `button`.
    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
    }

    /// Returns true if `button` is in the set.
    #[must_use]
    pub const fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    /// Buttons in `self` that are not in `previous`.
    #[must_use]
    pub const fn newly_pressed_since(self, previous: Buttons) -> Self {
        Self(self.0 & !previous.0)
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(Button::ALL.iter().filter(|&&b| self.contains(b)))
            .finish()
    }
}

/// Everything read from the gamepad in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadFrame {
    /// Analog sticks.
    pub sample: JoystickSample,
    /// Buttons currently held.
    pub held: Buttons,
    /// Buttons that went down since the previous read.
    pub just_pressed: Buttons,
}

impl GamepadFrame {
    /// A frame from an unreadable link: sticks pinned low, nothing pressed.
    pub const DISCONNECTED: Self = Self {
        sample: JoystickSample::DISCONNECTED,
        held: Buttons::NONE,
        just_pressed: Buttons::NONE,
    };

    /// Returns true while `button` is held.
    #[must_use]
    pub fn is_pressed(&self, button: Button) -> bool {
        self.held.contains(button)
    }

    /// Returns true on the cycle `button` went down.
    #[must_use]
    pub fn was_just_pressed(&self, button: Button) -> bool {
        self.just_pressed.contains(button)
    }
}

/// Outcome of a device configuration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Controller found and answering.
    Configured,
    /// No controller found.
    NotFound,
    /// Controller found but not accepting commands.
    NotAcceptingCommands,
    /// Controller works but refused analog button pressures.
    PressuresRefused,
}

/// Controller family reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Nothing connected, or the type could not be read.
    Unknown,
    DualShock4,
    DualSense,
    DualSenseEdge,
    /// A device of the right vendor that cannot drive the vehicle.
    Unsupported(u16),
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::Unknown => write!(f, "Unknown"),
            ControllerKind::DualShock4 => write!(f, "DualShock 4"),
            ControllerKind::DualSense => write!(f, "DualSense"),
            ControllerKind::DualSenseEdge => write!(f, "DualSense Edge"),
            ControllerKind::Unsupported(product) => {
                write!(f, "unsupported (product 0x{:04x})", product)
            }
        }
    }
}

/// Link status and controller type from the last configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub link: LinkStatus,
    pub kind: ControllerKind,
}

impl DeviceStatus {
    /// Status before any configuration attempt.
    pub const NOT_FOUND: Self = Self {
        link: LinkStatus::NotFound,
        kind: ControllerKind::Unknown,
    };

    /// Whether samples from this device may be trusted at all.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.fault().is_none()
    }

    /// The fault that keeps this device from being used, if any.
    #[must_use]
    pub fn fault(&self) -> Option<ControllerFault> {
        match (self.link, self.kind) {
            (LinkStatus::NotFound, _) => Some(ControllerFault::DeviceAbsent),
            (LinkStatus::NotAcceptingCommands, _) => Some(ControllerFault::DeviceUnresponsive),
            (_, ControllerKind::Unsupported(_)) => Some(ControllerFault::DeviceUnsupportedVariant),
            _ => None,
        }
    }
}

/// Why the current input cannot be used to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerFault {
    /// No controller on the link.
    DeviceAbsent,
    /// Controller present but not answering.
    DeviceUnresponsive,
    /// Controller type cannot drive the vehicle.
    DeviceUnsupportedVariant,
    /// Sticks read all-low or all-high: floating or disconnected link.
    LinkPinned,
    /// Brown-out pattern on the drive sticks, usually a low controller battery.
    SignalDegraded,
}

/// A polled gamepad.
///
/// `read` never fails: an unreadable device returns
/// [`GamepadFrame::DISCONNECTED`] and the watchdog takes it from there.
#[cfg_attr(test, mockall::automock)]
pub trait Gamepad {
    /// (Re)establishes the link to the controller.
    fn configure(&mut self) -> DeviceStatus;

    /// Polls the controller once.
    fn read(&mut self) -> GamepadFrame;
}
