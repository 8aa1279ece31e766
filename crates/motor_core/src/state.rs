//! Control modes, setpoint merge rules and the body of one control cycle.

use serde::Serialize;

use crate::config::ControllerConfig;
use crate::hal;
use crate::pid::{PidController, PidGains};
use crate::units::GearScale;
use crate::velocity::VelocityEstimator;

/// Active goal. The setpoint lives inside the variant it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ControlMode {
    #[default]
    Idle,
    /// Absolute encoder-count target.
    Position { target: i64 },
    /// Counts per control interval.
    Speed { counts_per_interval: f64 },
}

/// Discriminant of [`ControlMode`], compared cycle to cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModeKind {
    Idle,
    Position,
    Speed,
}

impl ControlMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            ControlMode::Idle => ModeKind::Idle,
            ControlMode::Position { .. } => ModeKind::Position,
            ControlMode::Speed { .. } => ModeKind::Speed,
        }
    }
}

/// What the cycle asks of the actuator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCommand {
    Drive(f64),
    Brake,
}

impl DriveCommand {
    pub fn apply<D: hal::MotorDriver + ?Sized>(self, driver: &mut D) -> Result<(), crate::HalError> {
        match self {
            DriveCommand::Drive(speed) => driver.drive(speed),
            DriveCommand::Brake => driver.brake(),
        }
    }
}

/// Result of [`ControllerState::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub mode: ModeKind,
    pub mode_changed: bool,
    /// Position target in counts or speed target in counts per interval.
    pub setpoint: Option<f64>,
    pub command: Option<DriveCommand>,
    /// Raw PID output before clamping, when one was computed.
    pub pid_output: Option<f64>,
    pub measured_speed: f64,
}

#[derive(Debug, Clone)]
pub struct ControllerState {
    mode: ControlMode,
    last_cycle_mode: ModeKind,
    position_pid: PidController,
    speed_pid: PidController,
    velocity: VelocityEstimator,
    /// Turns per second, refreshed every cycle in every mode.
    measured_speed: f64,
    last_count: i64,
    deadband: i64,
    scale: GearScale,
}

impl ControllerState {
    pub fn new(config: &ControllerConfig) -> Self {
        let scale = config.scale();
        let dt = scale.interval_secs();
        Self {
            mode: ControlMode::Idle,
            last_cycle_mode: ModeKind::Idle,
            position_pid: PidController::new(config.position_pid, dt)
                .with_integral_limit(config.integral_limit),
            speed_pid: PidController::new(config.speed_pid, dt)
                .with_integral_limit(config.integral_limit),
            velocity: VelocityEstimator::new(config.velocity_window),
            measured_speed: 0.0,
            last_count: 0,
            deadband: config.deadband_counts,
            scale,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn measured_speed(&self) -> f64 {
        self.measured_speed
    }

    pub fn last_count(&self) -> i64 {
        self.last_count
    }

    pub fn scale(&self) -> &GearScale {
        &self.scale
    }

    pub fn position_pid(&self) -> &PidController {
        &self.position_pid
    }

    pub fn speed_pid(&self) -> &PidController {
        &self.speed_pid
    }

    pub fn note_count(&mut self, count: i64) {
        self.last_count = count;
    }

    /// `drive`/`brake` from the API: drop any closed-loop goal.
    pub fn enter_idle(&mut self) {
        self.mode = ControlMode::Idle;
    }

    /// Relative move. Composes additively with a pending position goal;
    /// otherwise starts from `current_count`.
    pub fn rotate_counts(&mut self, delta: i64, current_count: i64) -> i64 {
        let target = match self.mode {
            ControlMode::Position { target } => target.saturating_add(delta),
            _ => current_count.saturating_add(delta),
        };
        self.mode = ControlMode::Position { target };
        target
    }

    /// Replace the speed goal. Never accumulates.
    pub fn set_speed_target(&mut self, counts_per_interval: f64) {
        self.mode = ControlMode::Speed { counts_per_interval };
    }

    pub fn tune_position(&mut self, gains: PidGains) {
        self.position_pid.set_tunings(gains);
    }

    pub fn tune_speed(&mut self, gains: PidGains) {
        self.speed_pid.set_tunings(gains);
    }

    /// One control cycle given a fresh encoder count.
    ///
    /// The caller holds the controller lock for the whole call and applies
    /// the returned command before releasing it.
    pub fn step(&mut self, count: i64) -> CycleOutput {
        self.last_count = count;

        let kind = self.mode.kind();
        let mode_changed = kind != self.last_cycle_mode;
        if mode_changed {
            self.position_pid.reset();
            self.speed_pid.reset();
            self.last_cycle_mode = kind;
        }

        let window_delta = self.velocity.sample(count);
        let window = self.velocity.window();

        let (setpoint, command, pid_output) = match self.mode {
            ControlMode::Idle => (None, None, None),
            ControlMode::Position { target } => {
                let error = target.saturating_sub(count);
                if error.unsigned_abs() <= self.deadband.unsigned_abs() {
                    (Some(target as f64), Some(DriveCommand::Brake), None)
                } else {
                    let output = self.position_pid.compute(count as f64, target as f64);
                    (
                        Some(target as f64),
                        Some(DriveCommand::Drive(hal::clamp_speed(output))),
                        Some(output),
                    )
                }
            }
            ControlMode::Speed { counts_per_interval } => {
                let measured = window_delta as f64 / window as f64;
                let output = self.speed_pid.compute(measured, counts_per_interval);
                (
                    Some(counts_per_interval),
                    Some(DriveCommand::Drive(hal::clamp_speed(output))),
                    Some(output),
                )
            }
        };

        self.measured_speed = self.scale.window_delta_to_turns_per_sec(window_delta, window);

        CycleOutput {
            mode: kind,
            mode_changed,
            setpoint,
            command,
            pid_output,
            measured_speed: self.measured_speed,
        }
    }
}
