//! Controller bindings for mode changes and calibration edits.
//!
//! | Action                         | Buttons                                   |
//! |--------------------------------|-------------------------------------------|
//! | Enter drive                    | R3 (edge)                                 |
//! | Enter calibration              | R3 (edge) with PadRight + Select held     |
//! | Adopt buffer when entering drive | R2 held                                 |
//! | Commit offset when entering drive | R1 + R2 held                           |
//! | Test drive (calibration)       | Cross held                                |
//! | Zero buffer (calibration)      | Circle (edge)                             |
//! | Restore buffer (calibration)   | Square (edge)                             |
//! | Step buffer up/down            | PadUp / PadDown (edge)                    |
//! | Coarse / fine step modifier    | L1 / L2 held                              |

use crate::calibration::{AdjustDirection, StepSize};
use crate::controller::{Button, GamepadFrame};

use super::OperationalMode;

pub const MODE_BUTTON: Button = Button::R3;
pub const CALIBRATION_CHORD: [Button; 2] = [Button::PadRight, Button::Select];
pub const ADOPT_MODIFIER: Button = Button::R2;
pub const COMMIT_CHORD: [Button; 2] = [Button::R1, Button::R2];

pub const TEST_DRIVE_BUTTON: Button = Button::Cross;
pub const ZERO_BUFFER_BUTTON: Button = Button::Circle;
pub const RESTORE_BUFFER_BUTTON: Button = Button::Square;
pub const STEP_UP_BUTTON: Button = Button::PadUp;
pub const STEP_DOWN_BUTTON: Button = Button::PadDown;
pub const COARSE_MODIFIER: Button = Button::L1;
pub const FINE_MODIFIER: Button = Button::L2;

fn all_held(frame: &GamepadFrame, buttons: &[Button]) -> bool {
    buttons.iter().all(|&b| frame.is_pressed(b))
}

/// Mode requested by this frame, if the mode button went down.
#[must_use]
pub fn requested_mode(frame: &GamepadFrame) -> Option<OperationalMode> {
    if !frame.was_just_pressed(MODE_BUTTON) {
        return None;
    }
    if all_held(frame, &CALIBRATION_CHORD) {
        Some(OperationalMode::Calibration)
    } else {
        Some(OperationalMode::Drive)
    }
}

#[must_use]
pub fn adopt_requested(frame: &GamepadFrame) -> bool {
    frame.is_pressed(ADOPT_MODIFIER)
}

#[must_use]
pub fn commit_requested(frame: &GamepadFrame) -> bool {
    all_held(frame, &COMMIT_CHORD)
}

/// Step tier from the held modifiers.
#[must_use]
pub fn step_size(frame: &GamepadFrame) -> StepSize {
    StepSize::from_modifiers(frame.is_pressed(COARSE_MODIFIER), frame.is_pressed(FINE_MODIFIER))
}

/// Buffer edit direction requested this frame. Up wins if both went down.
#[must_use]
pub fn adjust_direction(frame: &GamepadFrame) -> Option<AdjustDirection> {
    if frame.was_just_pressed(STEP_UP_BUTTON) {
        Some(AdjustDirection::Increase)
    } else if frame.was_just_pressed(STEP_DOWN_BUTTON) {
        Some(AdjustDirection::Decrease)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Buttons, JoystickSample};

    fn frame(held: &[Button], just_pressed: &[Button]) -> GamepadFrame {
        GamepadFrame {
            sample: JoystickSample::CENTERED,
            held: Buttons::from_slice(held),
            just_pressed: Buttons::from_slice(just_pressed),
        }
    }

    #[test]
    fn test_no_mode_request_without_edge() {
        assert_eq!(requested_mode(&frame(&[Button::R3], &[])), None);
        assert_eq!(requested_mode(&GamepadFrame::default()), None);
    }

    #[test]
    fn test_mode_button_alone_requests_drive() {
        let f = frame(&[Button::R3], &[Button::R3]);
        assert_eq!(requested_mode(&f), Some(OperationalMode::Drive));
    }

    #[test]
    fn test_chord_requests_calibration() {
        let f = frame(&[Button::R3, Button::PadRight, Button::Select], &[Button::R3]);
        assert_eq!(requested_mode(&f), Some(OperationalMode::Calibration));
    }

    #[test]
    fn test_partial_chord_requests_drive() {
        let f = frame(&[Button::R3, Button::PadRight], &[Button::R3]);
        assert_eq!(requested_mode(&f), Some(OperationalMode::Drive));
    }

    #[test]
    fn test_commit_needs_both_modifiers() {
        assert!(!commit_requested(&frame(&[Button::R2], &[])));
        assert!(commit_requested(&frame(&[Button::R1, Button::R2], &[])));
        assert!(adopt_requested(&frame(&[Button::R2], &[])));
    }

    #[test]
    fn test_step_size_modifiers() {
        assert_eq!(step_size(&frame(&[], &[])), StepSize::Medium);
        assert_eq!(step_size(&frame(&[Button::L1], &[])), StepSize::Coarse);
        assert_eq!(step_size(&frame(&[Button::L2], &[])), StepSize::Fine);
    }

    #[test]
    fn test_adjust_direction_uses_edges() {
        assert_eq!(adjust_direction(&frame(&[Button::PadUp], &[])), None);
        assert_eq!(
            adjust_direction(&frame(&[Button::PadDown], &[Button::PadDown])),
            Some(AdjustDirection::Decrease)
        );
    }
}
