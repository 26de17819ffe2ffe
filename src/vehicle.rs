//! # Vehicle
//!
//! [`Vehicle`] owns all per-cycle state: the gamepad, its watchdog, the mode
//! state machine, the calibration store and the steering engine.
//! [`Vehicle::step`] runs one cycle synchronously:
//!
//! 1. Read the gamepad
//! 2. Validate the sample
//! 3. Run the active mode and evaluate mode triggers
//! 4. Reconfigure the gamepad if the watchdog asked for it
//!
//! [`ControlLoop`] wraps a vehicle with its outputs (motors, buzzer,
//! telemetry) and paces it with a [`ClockScheduler`].

use std::future::Future;

use tracing::{debug, info, warn};

use crate::calibration::storage::CalibrationStorage;
use crate::calibration::CalibrationStore;
use crate::config::Config;
use crate::controller::watchdog::{ControllerHealth, ControllerWatchdog};
use crate::controller::{DeviceStatus, Gamepad, GamepadFrame};
use crate::drive::steering::{Steering, SteeringCommand, SteeringEngine};
use crate::feedback::{Buzzer, Chime, ChimePlayer};
use crate::mode::{ModeContext, ModeEffects, ModeStateMachine, MotorDemand, OperationalMode};
use crate::motors::{compensate_command, MotorOutput};
use crate::scheduler::{ClockScheduler, Clock};
use crate::telemetry::{CycleRecord, TelemetryLogger};

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub now_ms: u32,
    /// Mode after triggers were applied.
    pub mode: OperationalMode,
    pub frame: GamepadFrame,
    pub health: ControllerHealth,
    /// What the mode asked for, before compensation.
    pub demand: MotorDemand,
    /// What goes to the motors.
    pub command: SteeringCommand,
    pub effects: ModeEffects,
    /// The sample showed the brown-out pattern.
    pub low_signal: bool,
    /// Status from a watchdog-triggered reconfiguration.
    pub rediscovered: Option<DeviceStatus>,
    pub offset: u8,
    pub buffer: u8,
}

impl CycleOutput {
    /// Steering intermediates, when the drive mode steered.
    pub fn steering(&self) -> Option<&Steering> {
        self.demand.steering()
    }

    /// Telemetry line for this cycle.
    pub fn record(&self, overrun: bool) -> CycleRecord {
        let steering = self.steering().copied().unwrap_or_default();
        let sample = self.frame.sample;
        CycleRecord {
            timestamp: CycleRecord::now_timestamp(),
            cycle_ms: self.now_ms,
            mode: self.mode,
            valid: self.health.is_valid,
            fault: self.health.fault,
            lx: sample.lx,
            ly: sample.ly,
            rx: sample.rx,
            ry: sample.ry,
            accel: steering.accel,
            curve: steering.curve,
            curvature_percent: steering.curvature_percent,
            left: self.command.left,
            right: self.command.right,
            offset: self.offset,
            buffer: self.buffer,
            overrun,
        }
    }
}

/// The vehicle's control state.
pub struct Vehicle<G, S> {
    gamepad: G,
    watchdog: ControllerWatchdog,
    modes: ModeStateMachine,
    calibration: CalibrationStore<S>,
    steering: SteeringEngine,
    compensate_deadzone: bool,
}

impl<G, S> std::fmt::Debug for Vehicle<G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("mode", &self.modes.mode())
            .field("health", self.watchdog.health())
            .finish_non_exhaustive()
    }
}

impl<G: Gamepad, S: CalibrationStorage> Vehicle<G, S> {
    pub fn new(gamepad: G, storage: S, config: &Config) -> Self {
        Self {
            gamepad,
            watchdog: ControllerWatchdog::new(config.controller.timeout_ms),
            modes: ModeStateMachine::new(config.timing.clone()),
            calibration: CalibrationStore::new(storage, config.calibration.address),
            steering: SteeringEngine::new(config.drive.steering_params()),
            compensate_deadzone: config.motors.compensate_deadzone,
        }
    }

    /// Configures the gamepad, loads the calibration and enters wait mode.
    pub fn start(&mut self) -> ModeEffects {
        let status = self.gamepad.configure();
        self.watchdog.record_device_status(status);
        self.calibration.load();

        let frame = GamepadFrame::default();
        let mut ctx = ModeContext {
            frame: &frame,
            input_valid: false,
            steering: &self.steering,
            calibration: &mut self.calibration,
        };
        self.modes.start(&mut ctx)
    }

    /// Runs one control cycle at `now_ms`.
    pub fn step(&mut self, now_ms: u32) -> CycleOutput {
        let frame = self.gamepad.read();
        let input_valid = self.watchdog.validate(&frame.sample, now_ms);

        let mut ctx = ModeContext {
            frame: &frame,
            input_valid,
            steering: &self.steering,
            calibration: &mut self.calibration,
        };
        let step = self.modes.step(&mut ctx);

        let rediscovered = if self.watchdog.take_rediscovery_request() {
            let status = self.gamepad.configure();
            self.watchdog.record_device_status(status);
            Some(status)
        } else {
            None
        };

        let command = match step.demand {
            MotorDemand::Steer(_) if self.compensate_deadzone => {
                compensate_command(step.demand.command(), self.calibration.offset())
            }
            demand => demand.command(),
        };

        CycleOutput {
            now_ms,
            mode: self.modes.mode(),
            frame,
            health: *self.watchdog.health(),
            demand: step.demand,
            command,
            effects: step.effects,
            low_signal: self.watchdog.low_signal_alert(),
            rediscovered,
            offset: self.calibration.offset(),
            buffer: self.calibration.buffer(),
        }
    }

    pub fn mode(&self) -> OperationalMode {
        self.modes.mode()
    }

    pub fn watchdog(&self) -> &ControllerWatchdog {
        &self.watchdog
    }

    pub fn calibration(&self) -> &CalibrationStore<S> {
        &self.calibration
    }
}

/// A vehicle wired to its outputs and paced by a scheduler.
pub struct ControlLoop<G, S, M, B, C> {
    vehicle: Vehicle<G, S>,
    motors: M,
    buzzer: B,
    chimes: ChimePlayer,
    scheduler: ClockScheduler<C>,
    telemetry: Option<TelemetryLogger>,
    previous_overrun: bool,
    motor_fault: bool,
    cycles: u64,
}

impl<G, S, M, B, C> ControlLoop<G, S, M, B, C>
where
    G: Gamepad,
    S: CalibrationStorage,
    M: MotorOutput,
    B: Buzzer,
    C: Clock,
{
    pub fn new(
        vehicle: Vehicle<G, S>,
        motors: M,
        buzzer: B,
        scheduler: ClockScheduler<C>,
        telemetry: Option<TelemetryLogger>,
    ) -> Self {
        Self {
            vehicle,
            motors,
            buzzer,
            chimes: ChimePlayer::new(),
            scheduler,
            telemetry,
            previous_overrun: false,
            motor_fault: false,
            cycles: 0,
        }
    }

    pub fn vehicle(&self) -> &Vehicle<G, S> {
        &self.vehicle
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    pub fn scheduler(&self) -> &ClockScheduler<C> {
        &self.scheduler
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Starts the vehicle: wait mode, its period and its chime.
    pub fn start(&mut self) {
        let effects = self.vehicle.start();
        self.apply_effects(&effects);
        info!(
            "Vehicle started in {} mode, cycle period {} ms",
            self.vehicle.mode(),
            self.scheduler.period_ms()
        );
    }

    fn apply_effects(&mut self, effects: &ModeEffects) {
        if let Some(period) = effects.period_ms {
            self.scheduler.set_period(period);
        }
        for &chime in &effects.chimes {
            self.chimes.play(chime);
        }
    }

    /// Runs one paced cycle.
    pub async fn run_cycle(&mut self) -> CycleOutput {
        let now = self.scheduler.begin_cycle();
        let output = self.vehicle.step(now);

        self.apply_effects(&output.effects);
        if output.low_signal {
            self.chimes.play(Chime::LowSignal);
        }

        let command = output.command;
        match self.motors.drive(command.left, command.right).await {
            Ok(()) if self.motor_fault => {
                info!("Motor link recovered");
                self.motor_fault = false;
            }
            Ok(()) => {}
            Err(e) if !self.motor_fault => {
                warn!("Motor command failed: {}", e);
                self.motor_fault = true;
            }
            Err(_) => {}
        }

        self.chimes.update(now, &mut self.buzzer);

        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.log(now, &output.record(self.previous_overrun));
        }

        log_cycle(&output);

        let timing = self.scheduler.end_cycle().await;
        self.previous_overrun = timing.overrun;
        self.cycles += 1;
        output
    }

    /// Runs cycles until `shutdown` completes, then stops the motors.
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.run_cycle() => {}
            }
        }
        info!("Shutdown requested after {} cycles", self.cycles);
        self.stop().await;
    }

    /// Stops the motors, silences the buzzer and flushes telemetry.
    pub async fn stop(&mut self) {
        if let Err(e) = self.motors.stop().await {
            warn!("Failed to stop motors: {}", e);
        }
        self.chimes.silence(&mut self.buzzer);
        if let Some(telemetry) = self.telemetry.as_mut() {
            if let Err(e) = telemetry.flush() {
                warn!("Failed to flush telemetry: {}", e);
            }
        }
        if self.scheduler.overruns() > 0 {
            info!("{} cycle overruns this run", self.scheduler.overruns());
        }
    }
}

fn log_cycle(output: &CycleOutput) {
    let steering = output.steering().copied().unwrap_or_default();
    debug!(
        target: "skid_pilot::cycle",
        t = output.now_ms,
        mode = %output.mode,
        valid = output.health.is_valid,
        lx = output.frame.sample.lx,
        ry = output.frame.sample.ry,
        accel = steering.accel,
        curve = steering.curve,
        offset = output.offset,
        buffer = output.buffer,
        percent = steering.curvature_percent,
        left = output.command.left,
        right = output.command.right,
    );
}
