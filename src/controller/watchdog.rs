//! # Controller Watchdog
//!
//! Decides every cycle whether the gamepad sample can be trusted, and asks
//! for the controller to be reconfigured when it stays untrustworthy.
//!
//! ## Classification
//!
//! Checked in order:
//!
//! 1. The last configuration left the device unusable (absent, unresponsive,
//!    unsupported) → invalid.
//! 2. All four sticks read 0, or all read 255 → invalid. The link is floating
//!    or the controller is unplugged.
//! 3. Both drive sticks (lx and ry) read [`BROWNOUT_SIGNATURE`] → invalid,
//!    and a low-signal alert is raised. This pattern shows up when the
//!    controller's logic voltage sags, usually a flat battery.
//! 4. Anything else → valid.
//!
//! ## Timing
//!
//! The first invalid cycle of a run opens an error window. Once the window
//! is older than the timeout a rediscovery is requested and the window is
//! closed, so a still-missing device gets a fresh timeout before the next
//! attempt. A single valid cycle closes the window immediately.
//!
//! Timestamps are wrapping millisecond counters; windows are measured with
//! `wrapping_sub` so counter rollover does not matter.

use tracing::{debug, info, warn};

use super::{ControllerFault, DeviceStatus, JoystickSample};

/// Stick value both drive channels show during a brown-out.
pub const BROWNOUT_SIGNATURE: u8 = 115;

/// Default time an invalid run may last before rediscovery.
pub const DEFAULT_TIMEOUT_MS: u32 = 2000;

/// Link health as seen by the rest of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerHealth {
    /// Whether the last sample may be used to drive.
    pub is_valid: bool,
    /// Start of the current invalid run.
    pub first_error_ms: Option<u32>,
    /// Most recent invalid sample.
    pub last_error_ms: Option<u32>,
    /// Why the last sample was rejected.
    pub fault: Option<ControllerFault>,
}

/// Validates samples and schedules controller rediscovery.
#[derive(Debug)]
pub struct ControllerWatchdog {
    timeout_ms: u32,
    health: ControllerHealth,
    device: DeviceStatus,
    rediscovery_requested: bool,
    low_signal: bool,
    rediscoveries: u32,
}

impl Default for ControllerWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl ControllerWatchdog {
    /// Creates a watchdog. Until [`record_device_status`](Self::record_device_status)
    /// reports a usable device every sample is rejected.
    #[must_use]
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            health: ControllerHealth::default(),
            device: DeviceStatus::NOT_FOUND,
            rediscovery_requested: false,
            low_signal: false,
            rediscoveries: 0,
        }
    }

    /// Current link health.
    #[must_use]
    pub fn health(&self) -> &ControllerHealth {
        &self.health
    }

    /// Status from the last device configuration.
    #[must_use]
    pub fn device_status(&self) -> DeviceStatus {
        self.device
    }

    /// Number of rediscoveries requested so far.
    #[must_use]
    pub fn rediscoveries(&self) -> u32 {
        self.rediscoveries
    }

    /// Records the outcome of a device configuration.
    pub fn record_device_status(&mut self, status: DeviceStatus) {
        if status != self.device {
            match status.fault() {
                None => info!("Controller ready: {} ({:?})", status.kind, status.link),
                Some(fault) => warn!("Controller unavailable: {:?}", fault),
            }
        }
        self.device = status;
    }

    /// Classifies a sample without touching any state.
    #[must_use]
    pub fn classify(&self, sample: &JoystickSample) -> Option<ControllerFault> {
        if let Some(fault) = self.device.fault() {
            return Some(fault);
        }

        let channels = sample.channels();
        if channels.iter().all(|&c| c == 0) || channels.iter().all(|&c| c == 255) {
            return Some(ControllerFault::LinkPinned);
        }

        if sample.lx == BROWNOUT_SIGNATURE && sample.ry == BROWNOUT_SIGNATURE {
            return Some(ControllerFault::SignalDegraded);
        }

        None
    }

    /// Validates one cycle's sample, updating health and the error window.
    ///
    /// # Returns
    ///
    /// `true` if the sample may be used to drive.
    pub fn validate(&mut self, sample: &JoystickSample, now_ms: u32) -> bool {
        let fault = self.classify(sample);
        self.low_signal = fault == Some(ControllerFault::SignalDegraded);
        self.health.fault = fault;

        if fault.is_none() {
            if self.health.first_error_ms.is_some() {
                debug!("Controller valid again");
            }
            self.health.is_valid = true;
            self.health.first_error_ms = None;
            return true;
        }

        self.health.is_valid = false;
        self.health.last_error_ms = Some(now_ms);

        match self.health.first_error_ms {
            None => self.health.first_error_ms = Some(now_ms),
            Some(first) => {
                if now_ms.wrapping_sub(first) > self.timeout_ms {
                    info!(
                        "Controller invalid for {} ms ({:?}), rediscovering",
                        now_ms.wrapping_sub(first),
                        fault
                    );
                    self.rediscovery_requested = true;
                    self.rediscoveries += 1;
                    self.health.first_error_ms = None;
                }
            }
        }

        false
    }

    /// Whether the last sample showed the brown-out pattern.
    #[must_use]
    pub fn low_signal_alert(&self) -> bool {
        self.low_signal
    }

    /// Returns and clears a pending rediscovery request.
    pub fn take_rediscovery_request(&mut self) -> bool {
        std::mem::take(&mut self.rediscovery_requested)
    }
}
