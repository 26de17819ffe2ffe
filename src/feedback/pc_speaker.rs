//! PC speaker buzzer through the evdev `EV_SND` interface.
//!
//! The kernel's `pcspkr` driver exposes an input device that accepts
//! `SND_TONE` events: a non-zero value starts a tone at that frequency, zero
//! stops it.

use evdev::{Device, EventType, InputEvent, SoundType};
use std::path::Path;
use tracing::{debug, info};

use super::Buzzer;
use crate::error::{Result, SkidPilotError};

/// Directory scanned for event devices
const INPUT_DIR: &str = "/dev/input/by-path";

/// Fallback directory when no by-path links exist
const EVENT_DIR: &str = "/dev/input";

/// Whether an event node can play tones.
fn supports_tone(device: &Device) -> bool {
    device
        .supported_sounds()
        .map_or(false, |sounds| sounds.contains(SoundType::SND_TONE))
}

/// Evdev tone device.
pub struct PcSpeaker {
    device: Device,
    path: String,
}

impl std::fmt::Debug for PcSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcSpeaker").field("path", &self.path).finish_non_exhaustive()
    }
}

impl PcSpeaker {
    /// Opens `path`, or the first tone-capable input device when `path` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SkidPilotError::Io`] if the given device cannot be opened, or
    /// [`SkidPilotError::Feedback`] if it cannot play tones or none is found.
    pub fn open(path: &str) -> Result<Self> {
        if !path.is_empty() {
            let device = Device::open(path)?;
            if !supports_tone(&device) {
                return Err(SkidPilotError::Feedback(format!("{} cannot play tones", path)));
            }
            info!("Using tone device {}", path);
            return Ok(Self {
                device,
                path: path.to_string(),
            });
        }

        for dir in [INPUT_DIR, EVENT_DIR] {
            if let Some(speaker) = Self::scan(Path::new(dir)) {
                return Ok(speaker);
            }
        }

        Err(SkidPilotError::Feedback("No tone-capable input device found".to_string()))
    }

    fn scan(dir: &Path) -> Option<Self> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for path in entries {
            let Ok(device) = Device::open(&path) else {
                continue;
            };
            if supports_tone(&device) {
                let path = path.display().to_string();
                info!("Found tone device {} ({})", path, device.name().unwrap_or("unnamed"));
                return Some(Self { device, path });
            }
            debug!("{} cannot play tones", path.display());
        }
        None
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn send_tone(&mut self, frequency_hz: u16) -> Result<()> {
        let event = InputEvent::new(EventType::SOUND, SoundType::SND_TONE.0, i32::from(frequency_hz));
        self.device.send_events(&[event])?;
        Ok(())
    }
}

impl Buzzer for PcSpeaker {
    fn start_tone(&mut self, frequency_hz: u16) -> Result<()> {
        self.send_tone(frequency_hz)
    }

    fn stop_tone(&mut self) -> Result<()> {
        self.send_tone(0)
    }
}

impl Drop for PcSpeaker {
    fn drop(&mut self) {
        let _ = self.send_tone(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_path_fails() {
        let result = PcSpeaker::open("/dev/input/nonexistent_speaker_12345");
        assert!(matches!(result, Err(SkidPilotError::Io(_))));
    }

    #[test]
    fn test_scan_missing_dir_finds_nothing() {
        assert!(PcSpeaker::scan(Path::new("/nonexistent/input/dir")).is_none());
    }

    // Requires the pcspkr module and access to its event node
    #[test]
    #[ignore]
    fn test_beep_with_real_hardware() {
        match PcSpeaker::open("") {
            Ok(mut speaker) => {
                println!("Using {}", speaker.path());
                speaker.start_tone(880).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(100));
                speaker.stop_tone().unwrap();
            }
            Err(e) => println!("No tone device: {}", e),
        }
    }
}
