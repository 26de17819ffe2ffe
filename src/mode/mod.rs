//! # Operational Modes
//!
//! The vehicle is always in exactly one of three modes:
//!
//! - **Wait**: safe idle. The controller is read, the motors stay stopped.
//! - **Drive**: curvature steering from the sticks.
//! - **Calibration**: edits the deadzone buffer and allows a one-sided test
//!   drive with it. The persisted offset is untouched until committed.
//!
//! Each mode keeps its behavior in [`OperationalMode::on_enter`],
//! [`OperationalMode::tick`] and [`OperationalMode::on_exit`]. The only way to
//! change mode is [`ModeStateMachine::step`] reacting to the triggers in
//! [`bindings`].
//!
//! Invalid controller input forces a stop in every mode and disables all
//! triggers for that cycle.

pub mod bindings;

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::calibration::storage::CalibrationStorage;
use crate::calibration::CalibrationStore;
use crate::config::TimingConfig;
use crate::controller::GamepadFrame;
use crate::drive::steering::{Steering, SteeringCommand, SteeringEngine};
use crate::feedback::Chime;

/// Active operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalMode {
    Wait,
    Drive,
    Calibration,
}

impl OperationalMode {
    /// Short name used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            OperationalMode::Wait => "wait",
            OperationalMode::Drive => "drive",
            OperationalMode::Calibration => "calibration",
        }
    }

    /// Chime played when the mode is entered.
    #[must_use]
    pub const fn entry_chime(self) -> Chime {
        match self {
            OperationalMode::Wait => Chime::Ready,
            OperationalMode::Drive => Chime::DriveEntered,
            OperationalMode::Calibration => Chime::CalibrationEntered,
        }
    }

    /// Runs once when the mode becomes active.
    pub fn on_enter<S: CalibrationStorage>(self, ctx: &mut ModeContext<'_, S>, effects: &mut ModeEffects) {
        match self {
            OperationalMode::Wait => {}
            OperationalMode::Drive => {
                if bindings::adopt_requested(ctx.frame) && ctx.calibration.adopt_buffer() {
                    effects.adopted = true;
                    effects.chimes.push(Chime::OffsetAdopted);
                }
            }
            OperationalMode::Calibration => ctx.calibration.reset_buffer(),
        }
        effects.chimes.push(self.entry_chime());
    }

    /// Per-cycle work while the mode is active.
    pub fn tick<S: CalibrationStorage>(self, ctx: &mut ModeContext<'_, S>) -> MotorDemand {
        if !ctx.input_valid {
            return MotorDemand::Stop;
        }
        match self {
            OperationalMode::Wait => MotorDemand::Stop,
            OperationalMode::Drive => {
                let sample = ctx.frame.sample;
                MotorDemand::Steer(ctx.steering.steer_from_sticks(sample.lx, sample.ry))
            }
            OperationalMode::Calibration => calibration_tick(ctx),
        }
    }

    /// Runs once when the mode stops being active.
    pub fn on_exit<S: CalibrationStorage>(self, _ctx: &mut ModeContext<'_, S>) {
        // Calibration edits stay in the buffer; entering drive decides whether
        // they are adopted.
    }
}

impl fmt::Display for OperationalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn calibration_tick<S: CalibrationStorage>(ctx: &mut ModeContext<'_, S>) -> MotorDemand {
    let frame = ctx.frame;
    let store = &mut *ctx.calibration;

    // Zero wins over restore, and either one skips the step edit
    if frame.was_just_pressed(bindings::ZERO_BUFFER_BUTTON) {
        store.set_buffer(0);
    } else if frame.was_just_pressed(bindings::RESTORE_BUFFER_BUTTON) {
        store.reset_buffer();
    } else if let Some(direction) = bindings::adjust_direction(frame) {
        let value = store.adjust(direction, bindings::step_size(frame));
        info!("Calibration buffer {}", value);
    }

    if frame.is_pressed(bindings::TEST_DRIVE_BUTTON) {
        MotorDemand::TestDrive(SteeringCommand::new(i32::from(store.buffer()), 0))
    } else {
        MotorDemand::Stop
    }
}

/// What the active mode wants the motors to do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDemand {
    /// Both wheels stopped.
    Stop,
    /// Curvature steering output; subject to deadzone compensation.
    Steer(Steering),
    /// Raw calibration test drive; sent as is.
    TestDrive(SteeringCommand),
}

impl MotorDemand {
    /// Wheel speeds before any compensation.
    #[must_use]
    pub fn command(&self) -> SteeringCommand {
        match self {
            MotorDemand::Stop => SteeringCommand::STOP,
            MotorDemand::Steer(steering) => steering.command,
            MotorDemand::TestDrive(command) => *command,
        }
    }

    /// Steering intermediates, when steering ran.
    #[must_use]
    pub fn steering(&self) -> Option<&Steering> {
        match self {
            MotorDemand::Steer(steering) => Some(steering),
            _ => None,
        }
    }
}

/// Everything a mode may read or touch during a cycle.
pub struct ModeContext<'a, S> {
    pub frame: &'a GamepadFrame,
    pub input_valid: bool,
    pub steering: &'a SteeringEngine,
    pub calibration: &'a mut CalibrationStore<S>,
}

/// A completed mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OperationalMode,
    pub to: OperationalMode,
}

/// Side effects of one cycle of the state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeEffects {
    /// Chimes to play, in order.
    pub chimes: Vec<Chime>,
    /// New cycle period, set on every mode entry.
    pub period_ms: Option<u32>,
    pub transition: Option<Transition>,
    /// Buffer became the active offset.
    pub adopted: bool,
    /// Storage was written.
    pub committed: bool,
}

/// Result of [`ModeStateMachine::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModeStep {
    pub demand: MotorDemand,
    pub effects: ModeEffects,
}

/// Owns the active mode and applies transition triggers.
#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    mode: OperationalMode,
    timing: TimingConfig,
    started: bool,
}

impl ModeStateMachine {
    /// Creates a state machine in `Wait`. Call [`start`](Self::start) once
    /// before stepping.
    #[must_use]
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            mode: OperationalMode::Wait,
            timing,
            started: false,
        }
    }

    /// Active mode.
    #[must_use]
    pub fn mode(&self) -> OperationalMode {
        self.mode
    }

    /// Enters the initial mode: sets its period and requests its chime.
    pub fn start<S: CalibrationStorage>(&mut self, ctx: &mut ModeContext<'_, S>) -> ModeEffects {
        let mut effects = ModeEffects::default();
        if self.started {
            return effects;
        }
        self.started = true;
        info!("Entering {} mode", self.mode);
        self.mode.on_enter(ctx, &mut effects);
        effects.period_ms = Some(self.timing.period_for(self.mode));
        effects
    }

    /// Runs the active mode for one cycle, then evaluates triggers.
    pub fn step<S: CalibrationStorage>(&mut self, ctx: &mut ModeContext<'_, S>) -> ModeStep {
        let demand = self.mode.tick(ctx);
        let mut effects = ModeEffects::default();

        if ctx.input_valid {
            if let Some(target) = bindings::requested_mode(ctx.frame) {
                self.transition_to(target, ctx, &mut effects);
                if target == OperationalMode::Drive && bindings::commit_requested(ctx.frame) {
                    commit_active_offset(ctx, &mut effects);
                }
            }
        }

        ModeStep { demand, effects }
    }

    fn transition_to<S: CalibrationStorage>(
        &mut self,
        target: OperationalMode,
        ctx: &mut ModeContext<'_, S>,
        effects: &mut ModeEffects,
    ) {
        if target == self.mode {
            return;
        }
        let from = self.mode;
        from.on_exit(ctx);
        self.mode = target;
        info!("Mode {} -> {}", from, target);
        target.on_enter(ctx, effects);
        effects.period_ms = Some(self.timing.period_for(target));
        effects.transition = Some(Transition { from, to: target });
    }
}

fn commit_active_offset<S: CalibrationStorage>(ctx: &mut ModeContext<'_, S>, effects: &mut ModeEffects) {
    let value = ctx.calibration.offset();
    match ctx.calibration.commit(value) {
        Ok(true) => {
            effects.committed = true;
            effects.chimes.push(Chime::CalibrationSaved);
        }
        Ok(false) => {}
        Err(e) => warn!("Failed to save calibration {}: {}", value, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::storage::MemoryStorage;
    use crate::controller::{Button, Buttons, JoystickSample};
    use crate::drive::steering::SteeringParams;

    struct Rig {
        machine: ModeStateMachine,
        steering: SteeringEngine,
        store: CalibrationStore<MemoryStorage>,
    }

    impl Rig {
        fn new(offset: u8) -> Self {
            let mut store = CalibrationStore::new(MemoryStorage::with_value(0, offset), 0);
            store.load();
            let mut rig = Self {
                machine: ModeStateMachine::new(TimingConfig::default()),
                steering: SteeringEngine::new(SteeringParams::default()),
                store,
            };
            rig.start();
            rig
        }

        fn start(&mut self) -> ModeEffects {
            let frame = GamepadFrame::default();
            let mut ctx = ModeContext {
                frame: &frame,
                input_valid: true,
                steering: &self.steering,
                calibration: &mut self.store,
            };
            self.machine.start(&mut ctx)
        }

        fn step_with(&mut self, frame: GamepadFrame, valid: bool) -> ModeStep {
            let mut ctx = ModeContext {
                frame: &frame,
                input_valid: valid,
                steering: &self.steering,
                calibration: &mut self.store,
            };
            self.machine.step(&mut ctx)
        }

        fn step(&mut self, held: &[Button], just_pressed: &[Button]) -> ModeStep {
            self.step_with(frame(JoystickSample::CENTERED, held, just_pressed), true)
        }

        fn press_mode(&mut self, modifiers: &[Button]) -> ModeStep {
            let mut held = modifiers.to_vec();
            held.push(Button::R3);
            self.step(&held, &[Button::R3])
        }

        fn enter_calibration(&mut self) -> ModeStep {
            self.press_mode(&[Button::PadRight, Button::Select])
        }
    }

    fn frame(sample: JoystickSample, held: &[Button], just_pressed: &[Button]) -> GamepadFrame {
        GamepadFrame {
            sample,
            held: Buttons::from_slice(held),
            just_pressed: Buttons::from_slice(just_pressed),
        }
    }

    #[test]
    fn test_start_enters_wait_with_chime_and_period() {
        let mut machine = ModeStateMachine::new(TimingConfig::default());
        let mut store = CalibrationStore::new(MemoryStorage::new(), 0);
        let steering = SteeringEngine::default();
        let frame = GamepadFrame::default();
        let mut ctx = ModeContext {
            frame: &frame,
            input_valid: true,
            steering: &steering,
            calibration: &mut store,
        };

        let effects = machine.start(&mut ctx);
        assert_eq!(machine.mode(), OperationalMode::Wait);
        assert_eq!(effects.chimes, vec![Chime::Ready]);
        assert_eq!(effects.period_ms, Some(50));

        // Starting twice does nothing
        assert_eq!(machine.start(&mut ctx), ModeEffects::default());
    }

    #[test]
    fn test_wait_never_moves_without_trigger() {
        let mut rig = Rig::new(0);
        let held_sets: [&[Button]; 4] = [
            &[],
            &[Button::Cross],
            &[Button::R3],
            &[Button::PadRight, Button::Select],
        ];
        for held in held_sets {
            let step = rig.step(held, &[]);
            assert_eq!(step.demand, MotorDemand::Stop);
            assert_eq!(step.effects.transition, None);
        }
        let sticks = frame(JoystickSample::new(255, 128, 128, 0), &[], &[]);
        assert_eq!(rig.step_with(sticks, true).demand, MotorDemand::Stop);
        assert_eq!(rig.machine.mode(), OperationalMode::Wait);
    }

    #[test]
    fn test_mode_button_enters_drive() {
        let mut rig = Rig::new(0);
        let step = rig.press_mode(&[]);
        assert_eq!(rig.machine.mode(), OperationalMode::Drive);
        assert_eq!(
            step.effects.transition,
            Some(Transition {
                from: OperationalMode::Wait,
                to: OperationalMode::Drive
            })
        );
        assert_eq!(step.effects.chimes, vec![Chime::DriveEntered]);
        assert_eq!(step.effects.period_ms, Some(50));
    }

    #[test]
    fn test_reentering_active_mode_is_noop() {
        let mut rig = Rig::new(0);
        rig.press_mode(&[]);
        let step = rig.press_mode(&[]);
        assert_eq!(rig.machine.mode(), OperationalMode::Drive);
        assert_eq!(step.effects, ModeEffects::default());
    }

    #[test]
    fn test_drive_steers_from_sticks() {
        let mut rig = Rig::new(0);
        rig.press_mode(&[]);
        let step = rig.step_with(frame(JoystickSample::new(255, 128, 128, 0), &[], &[]), true);
        assert_eq!(step.demand.command(), SteeringCommand { left: 255, right: 164 });
        assert_eq!(step.demand.steering().map(|s| s.curvature_percent), Some(18));
    }

    #[test]
    fn test_invalid_input_stops_and_ignores_triggers() {
        let mut rig = Rig::new(0);
        rig.press_mode(&[]);

        let pressed = frame(
            JoystickSample::new(115, 128, 128, 115),
            &[Button::R3, Button::PadRight, Button::Select],
            &[Button::R3],
        );
        let step = rig.step_with(pressed, false);
        assert_eq!(step.demand, MotorDemand::Stop);
        assert_eq!(step.effects.transition, None);
        assert_eq!(rig.machine.mode(), OperationalMode::Drive);
    }

    #[test]
    fn test_calibration_requires_exact_chord() {
        let mut rig = Rig::new(0);
        rig.press_mode(&[]);

        rig.press_mode(&[Button::Select]);
        assert_eq!(rig.machine.mode(), OperationalMode::Drive);

        let step = rig.enter_calibration();
        assert_eq!(rig.machine.mode(), OperationalMode::Calibration);
        assert_eq!(step.effects.chimes, vec![Chime::CalibrationEntered]);
    }

    #[test]
    fn test_calibration_reachable_from_wait() {
        let mut rig = Rig::new(0);
        rig.enter_calibration();
        assert_eq!(rig.machine.mode(), OperationalMode::Calibration);
    }

    #[test]
    fn test_calibration_edits_and_test_drive() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();

        rig.step(&[Button::PadUp], &[Button::PadUp]);
        assert_eq!(rig.store.buffer(), 45);
        rig.step(&[Button::PadUp, Button::L1], &[Button::PadUp]);
        assert_eq!(rig.store.buffer(), 60);
        rig.step(&[Button::PadDown, Button::L2], &[Button::PadDown]);
        assert_eq!(rig.store.buffer(), 59);

        // Holding does not repeat
        rig.step(&[Button::PadDown], &[]);
        assert_eq!(rig.store.buffer(), 59);

        let step = rig.step(&[Button::Cross], &[Button::Cross]);
        assert_eq!(step.demand, MotorDemand::TestDrive(SteeringCommand { left: 59, right: 0 }));

        rig.step(&[Button::Circle], &[Button::Circle]);
        assert_eq!(rig.store.buffer(), 0);
        rig.step(&[Button::Square], &[Button::Square]);
        assert_eq!(rig.store.buffer(), 40);

        // Offset and storage untouched by edits
        assert_eq!(rig.store.offset(), 40);
        assert_eq!(rig.store.storage().writes(), 0);
    }

    #[test]
    fn test_calibration_buffer_clamps() {
        let mut rig = Rig::new(250);
        rig.enter_calibration();
        rig.step(&[Button::PadUp, Button::L1], &[Button::PadUp]);
        assert_eq!(rig.store.buffer(), 255);
        for _ in 0..30 {
            rig.step(&[Button::PadDown, Button::L1], &[Button::PadDown]);
        }
        assert_eq!(rig.store.buffer(), 0);
    }

    #[test]
    fn test_invalid_input_ignores_calibration_edits() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();
        let edit = frame(JoystickSample::DISCONNECTED, &[Button::PadUp, Button::Cross], &[Button::PadUp]);
        let step = rig.step_with(edit, false);
        assert_eq!(step.demand, MotorDemand::Stop);
        assert_eq!(rig.store.buffer(), 40);
    }

    #[test]
    fn test_reentering_calibration_discards_edits() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();
        rig.step(&[Button::PadUp], &[Button::PadUp]);
        rig.press_mode(&[]);
        assert_eq!(rig.store.offset(), 40);

        rig.enter_calibration();
        assert_eq!(rig.store.buffer(), 40);
    }

    #[test]
    fn test_leaving_calibration_with_adopt_modifier() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();
        rig.step(&[Button::PadUp], &[Button::PadUp]);

        let step = rig.press_mode(&[Button::R2]);
        assert!(step.effects.adopted);
        assert!(!step.effects.committed);
        assert_eq!(step.effects.chimes, vec![Chime::OffsetAdopted, Chime::DriveEntered]);
        assert_eq!(rig.store.offset(), 45);
        assert_eq!(rig.store.storage().writes(), 0);
    }

    #[test]
    fn test_leaving_calibration_with_commit_chord() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();
        rig.step(&[Button::PadDown, Button::L2], &[Button::PadDown]);

        let step = rig.press_mode(&[Button::R1, Button::R2]);
        assert!(step.effects.adopted);
        assert!(step.effects.committed);
        assert_eq!(
            step.effects.chimes,
            vec![Chime::OffsetAdopted, Chime::DriveEntered, Chime::CalibrationSaved]
        );
        assert_eq!(rig.store.offset(), 39);
        assert_eq!(rig.store.stored(), 39);
        assert_eq!(rig.store.storage().writes(), 1);
    }

    #[test]
    fn test_commit_unchanged_offset_writes_nothing() {
        let mut rig = Rig::new(10);
        rig.enter_calibration();
        let step = rig.press_mode(&[Button::R1, Button::R2]);
        assert!(!step.effects.committed);
        assert_eq!(rig.store.storage().writes(), 0);
    }

    #[test]
    fn test_commit_from_drive_persists_adopted_offset() {
        let mut rig = Rig::new(10);
        rig.enter_calibration();
        rig.step(&[Button::PadUp], &[Button::PadUp]);
        rig.press_mode(&[Button::R2]);
        assert_eq!(rig.store.storage().writes(), 0);

        let step = rig.press_mode(&[Button::R1, Button::R2]);
        assert_eq!(step.effects.transition, None);
        assert!(step.effects.committed);
        assert_eq!(rig.store.stored(), 15);

        // Second commit of the same value is a no-op
        rig.press_mode(&[Button::R1, Button::R2]);
        assert_eq!(rig.store.storage().writes(), 1);
    }

    #[test]
    fn test_commit_chord_entering_calibration_writes_nothing() {
        let mut rig = Rig::new(10);
        rig.enter_calibration();
        rig.step(&[Button::PadUp], &[Button::PadUp]);
        rig.press_mode(&[Button::R2]);
        assert_eq!(rig.store.offset(), 15);

        let step = rig.press_mode(&[Button::PadRight, Button::Select, Button::R1, Button::R2]);
        assert_eq!(rig.machine.mode(), OperationalMode::Calibration);
        assert!(!step.effects.committed);
        assert!(!step.effects.chimes.contains(&Chime::CalibrationSaved));
        assert_eq!(rig.store.stored(), 10);
        assert_eq!(rig.store.storage().writes(), 0);
    }

    #[test]
    fn test_zero_edge_wins_over_restore_and_step() {
        let mut rig = Rig::new(40);
        rig.enter_calibration();
        rig.step(&[Button::PadUp], &[Button::PadUp]);
        assert_eq!(rig.store.buffer(), 45);

        let all = [Button::Circle, Button::Square, Button::PadUp];
        rig.step(&all, &all);
        assert_eq!(rig.store.buffer(), 0);

        rig.step(&[Button::PadUp], &[Button::PadUp]);
        let restore = [Button::Square, Button::PadUp];
        rig.step(&restore, &restore);
        assert_eq!(rig.store.buffer(), 40);
    }

    #[test]
    fn test_per_mode_periods() {
        let timing = TimingConfig {
            cycle_period_ms: 50,
            wait_period_ms: Some(100),
            drive_period_ms: Some(20),
            calibration_period_ms: None,
        };
        let mut rig = Rig::new(0);
        rig.machine = ModeStateMachine::new(timing);
        assert_eq!(rig.start().period_ms, Some(100));
        assert_eq!(rig.press_mode(&[]).effects.period_ms, Some(20));
        assert_eq!(rig.enter_calibration().effects.period_ms, Some(50));
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(OperationalMode::Calibration.to_string(), "calibration");
        assert_eq!(serde_json::to_string(&OperationalMode::Drive).unwrap(), "\"drive\"");
    }
}
