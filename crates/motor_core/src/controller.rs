use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::ControllerConfig;
use crate::diagnostics::{DiagnosticsSnapshot, SharedDiagnostics};
use crate::error::{ConfigError, CycleError};
use crate::hal::{self, Encoder, MotorDriver};
use crate::pid::PidGains;
use crate::state::{ControlMode, ControllerState, CycleOutput, DriveCommand, ModeKind};
use crate::units::{AngleUnit, GearScale, SpeedUnit};

/// Everything the single lock protects.
struct Inner<D> {
    state: ControllerState,
    driver: D,
}

struct Shared<D, E> {
    inner: Mutex<Inner<D>>,
    encoder: E,
    scale: GearScale,
    interval: Duration,
    diagnostics: SharedDiagnostics,
}

/// One completed control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub count: i64,
    pub output: CycleOutput,
    pub lock_wait: Duration,
}

/// Thread-safe command surface of one gear-motor.
///
/// Clones share the same state. Commands take the controller lock for their
/// whole read-modify-write and never report errors; the periodic task calls
/// [`Controller::run_cycle`] once per interval.
pub struct Controller<D, E> {
    shared: Arc<Shared<D, E>>,
}

impl<D, E> Clone for Controller<D, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: MotorDriver, E: Encoder> Controller<D, E> {
    /// Validates `config` and zeroes the encoder.
    pub fn new(driver: D, mut encoder: E, config: &ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        encoder.clear_count();

        let scale = config.scale();
        info!(
            counts_per_turn = scale.counts_per_turn(),
            interval_ms = config.interval_ms,
            deadband = config.deadband_counts,
            window = config.velocity_window,
            "controller created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ControllerState::new(config),
                    driver,
                }),
                encoder,
                scale,
                interval: config.interval(),
                diagnostics: SharedDiagnostics::default(),
            }),
        })
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn scale(&self) -> GearScale {
        self.shared.scale
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }

    /// Count a cycle that started more than one interval after its tick.
    pub fn record_late(&self) {
        self.shared.diagnostics.record_late();
    }

    /// Raw duty command, clamped to `[-1, 1]`. Drops any closed-loop goal.
    pub fn drive(&self, speed: f64) {
        let speed = hal::clamp_speed(speed);
        let mut inner = self.shared.inner.lock();
        if inner.state.mode().kind() != ModeKind::Idle {
            debug!(speed, "closed-loop goal dropped by drive");
        }
        inner.state.enter_idle();
        self.apply(&mut inner, DriveCommand::Drive(speed));
    }

    pub fn brake(&self) {
        let mut inner = self.shared.inner.lock();
        inner.state.enter_idle();
        self.apply(&mut inner, DriveCommand::Brake);
    }

    fn apply(&self, inner: &mut Inner<D>, command: DriveCommand) {
        if let Err(e) = command.apply(&mut inner.driver) {
            self.shared.diagnostics.record_driver_failure();
            warn!(error = %e, ?command, "motor command failed");
        }
    }

    pub fn tune_position_pid(&self, kp: f64, ki: f64, kd: f64) {
        self.shared.inner.lock().state.tune_position(PidGains::new(kp, ki, kd));
    }

    pub fn tune_speed_pid(&self, kp: f64, ki: f64, kd: f64) {
        self.shared.inner.lock().state.tune_speed(PidGains::new(kp, ki, kd));
    }

    /// Rotate by a fraction of a turn. Calls made while a position goal is
    /// pending add up; otherwise the move starts from the present position.
    pub fn rotate(&self, turns: f64) {
        self.rotate_in(AngleUnit::Turns, turns);
    }

    pub fn rotate_rad(&self, angle: f64) {
        self.rotate_in(AngleUnit::Radians, angle);
    }

    pub fn rotate_deg(&self, angle: f64) {
        self.rotate_in(AngleUnit::Degrees, angle);
    }

    /// Non-finite angles are logged and ignored.
    pub fn rotate_in(&self, unit: AngleUnit, angle: f64) {
        if !angle.is_finite() {
            warn!(angle, ?unit, "non-finite rotation ignored");
            return;
        }
        let delta = self.shared.scale.turns_to_counts(unit.to_turns(angle));
        let count = self.shared.encoder.count().ok();

        let mut inner = self.shared.inner.lock();
        let current = match count {
            Some(count) => {
                inner.state.note_count(count);
                count
            }
            None => inner.state.last_count(),
        };
        let target = inner.state.rotate_counts(delta, current);
        debug!(delta, target, "position goal");
    }

    /// Total rotation since construction, in turns.
    pub fn get_position(&self) -> f64 {
        self.get_position_in(AngleUnit::Turns)
    }

    pub fn get_position_rad(&self) -> f64 {
        self.get_position_in(AngleUnit::Radians)
    }

    pub fn get_position_deg(&self) -> f64 {
        self.get_position_in(AngleUnit::Degrees)
    }

    pub fn get_position_in(&self, unit: AngleUnit) -> f64 {
        let count = match self.shared.encoder.count() {
            Ok(count) => count,
            Err(_) => self.shared.inner.lock().state.last_count(),
        };
        unit.from_turns(self.shared.scale.counts_to_turns(count))
    }

    /// Spin at `speed` turns per second (Hz).
    pub fn set_speed(&self, speed: f64) {
        self.set_speed_in(SpeedUnit::TurnsPerSec, speed);
    }

    pub fn set_speed_rad(&self, speed: f64) {
        self.set_speed_in(SpeedUnit::RadiansPerSec, speed);
    }

    pub fn set_speed_deg(&self, speed: f64) {
        self.set_speed_in(SpeedUnit::DegreesPerSec, speed);
    }

    pub fn set_speed_rpm(&self, speed: f64) {
        self.set_speed_in(SpeedUnit::Rpm, speed);
    }

    /// Non-finite rates are logged and ignored.
    pub fn set_speed_in(&self, unit: SpeedUnit, speed: f64) {
        if !speed.is_finite() {
            warn!(speed, ?unit, "non-finite speed goal ignored");
            return;
        }
        let cpi = self
            .shared
            .scale
            .turns_per_sec_to_counts_per_interval(unit.to_turns_per_sec(speed));
        self.shared.inner.lock().state.set_speed_target(cpi);
        debug!(counts_per_interval = cpi, "speed goal");
    }

    /// Last measured speed in turns per second.
    pub fn get_speed(&self) -> f64 {
        self.get_speed_in(SpeedUnit::TurnsPerSec)
    }

    pub fn get_speed_rad(&self) -> f64 {
        self.get_speed_in(SpeedUnit::RadiansPerSec)
    }

    pub fn get_speed_deg(&self) -> f64 {
        self.get_speed_in(SpeedUnit::DegreesPerSec)
    }

    pub fn get_speed_rpm(&self) -> f64 {
        self.get_speed_in(SpeedUnit::Rpm)
    }

    pub fn get_speed_in(&self, unit: SpeedUnit) -> f64 {
        let speed = self.shared.inner.lock().state.measured_speed();
        unit.from_turns_per_sec(speed)
    }

    pub fn mode(&self) -> ControlMode {
        self.shared.inner.lock().state.mode()
    }

    /// Pending position goal in turns, if in position mode.
    pub fn position_setpoint(&self) -> Option<f64> {
        match self.mode() {
            ControlMode::Position { target } => Some(self.shared.scale.counts_to_turns(target)),
            _ => None,
        }
    }

    /// Pending speed goal in turns per second, if in speed mode.
    pub fn speed_setpoint(&self) -> Option<f64> {
        match self.mode() {
            ControlMode::Speed { counts_per_interval } => Some(
                self.shared
                    .scale
                    .counts_per_interval_to_turns_per_sec(counts_per_interval),
            ),
            _ => None,
        }
    }

    /// One control cycle. The encoder is read before the lock is taken; the
    /// actuator is commanded inside it.
    ///
    /// An unreadable encoder skips the cycle and leaves the state untouched.
    /// A rejected actuator command does not: the state has already advanced,
    /// so the cycle counts as completed and the failure is reported as
    /// [`CycleError::CommandFailed`].
    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let count = match self.shared.encoder.count() {
            Ok(count) => count,
            Err(e) => {
                self.shared.diagnostics.record_skipped();
                warn!(error = %e, "control cycle skipped");
                return Err(e.into());
            }
        };

        let lock_start = Instant::now();
        let mut inner = self.shared.inner.lock();
        let lock_wait = lock_start.elapsed();

        let output = inner.state.step(count);
        if output.mode_changed {
            debug!(mode = ?output.mode, "mode change, PID units reset");
        }

        if let Some(command) = output.command {
            if let Err(e) = command.apply(&mut inner.driver) {
                drop(inner);
                self.shared.diagnostics.record_completed();
                self.shared.diagnostics.record_driver_failure();
                warn!(error = %e, ?command, "control command failed");
                return Err(CycleError::CommandFailed(e));
            }
        }
        drop(inner);

        self.shared.diagnostics.record_completed();
        trace!(count, command = ?output.command, speed = output.measured_speed, "cycle");

        Ok(CycleReport {
            count,
            output,
            lock_wait,
        })
    }
}
