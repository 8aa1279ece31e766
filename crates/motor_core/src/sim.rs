//! Software stand-ins for the motor driver and encoder.
//!
//! [`SimulatedMotor`] models a brushed gear-motor as a first-order plant:
//! shaft speed follows `duty * no_load_speed` with time constant `tau`, and
//! braking stops the shaft at once. Time either advances explicitly with
//! [`SimulatedMotor::advance`] or follows the wall clock when built with
//! [`SimulatedMotor::realtime`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::HalError;
use crate::hal::{self, Encoder, MotorDriver};
use crate::state::DriveCommand;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantModel {
    /// Output shaft speed at full duty, in encoder counts per second.
    pub no_load_counts_per_sec: f64,
    /// Seconds; zero means speed follows duty instantly.
    pub time_constant: f64,
}

impl PlantModel {
    /// Gear-motor spinning its output shaft at `rpm` with full duty.
    pub fn from_rpm(rpm: f64, counts_per_turn: f64, time_constant: f64) -> Self {
        Self {
            no_load_counts_per_sec: rpm / 60.0 * counts_per_turn,
            time_constant,
        }
    }
}

#[derive(Debug)]
struct Plant {
    model: PlantModel,
    duty: f64,
    braking: bool,
    /// Counts per second.
    velocity: f64,
    position: f64,
    last_update: Option<Instant>,
}

impl Plant {
    fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        if self.braking {
            self.velocity = 0.0;
            return;
        }
        let target = self.duty * self.model.no_load_counts_per_sec;
        let alpha = if self.model.time_constant > 0.0 {
            (dt / self.model.time_constant).min(1.0)
        } else {
            1.0
        };
        self.velocity += (target - self.velocity) * alpha;
        self.position += self.velocity * dt;
    }

    fn catch_up(&mut self) {
        if let Some(last) = self.last_update {
            let now = Instant::now();
            self.step(now.duration_since(last).as_secs_f64());
            self.last_update = Some(now);
        }
    }
}

#[derive(Debug)]
struct Shared {
    plant: Mutex<Plant>,
    /// Count at the last `clear_count`, subtracted from the plant position.
    zero: AtomicI64,
    encoder_online: AtomicBool,
    driver_online: AtomicBool,
}

/// Handle to a simulated motor; clones share the same plant.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    shared: Arc<Shared>,
}

impl SimulatedMotor {
    pub fn new(model: PlantModel) -> Self {
        Self::build(model, None)
    }

    pub fn realtime(model: PlantModel) -> Self {
        Self::build(model, Some(Instant::now()))
    }

    fn build(model: PlantModel, last_update: Option<Instant>) -> Self {
        Self {
            shared: Arc::new(Shared {
                plant: Mutex::new(Plant {
                    model,
                    duty: 0.0,
                    braking: false,
                    velocity: 0.0,
                    position: 0.0,
                    last_update,
                }),
                zero: AtomicI64::new(0),
                encoder_online: AtomicBool::new(true),
                driver_online: AtomicBool::new(true),
            }),
        }
    }

    pub fn driver(&self) -> SimDriver {
        SimDriver { motor: self.clone() }
    }

    pub fn encoder(&self) -> SimEncoder {
        SimEncoder { motor: self.clone() }
    }

    pub fn advance(&self, dt: Duration) {
        self.shared.plant.lock().step(dt.as_secs_f64());
    }

    /// Raw plant position in counts, ignoring `clear_count`.
    pub fn position_counts(&self) -> f64 {
        let mut plant = self.shared.plant.lock();
        plant.catch_up();
        plant.position
    }

    pub fn velocity_counts_per_sec(&self) -> f64 {
        let mut plant = self.shared.plant.lock();
        plant.catch_up();
        plant.velocity
    }

    pub fn is_braking(&self) -> bool {
        self.shared.plant.lock().braking
    }

    /// Move the shaft by hand, e.g. to emulate a load disturbance.
    pub fn displace(&self, counts: f64) {
        self.shared.plant.lock().position += counts;
    }

    pub fn set_encoder_online(&self, online: bool) {
        self.shared.encoder_online.store(online, Ordering::Relaxed);
    }

    pub fn set_driver_online(&self, online: bool) {
        self.shared.driver_online.store(online, Ordering::Relaxed);
    }
}

pub struct SimDriver {
    motor: SimulatedMotor,
}

impl MotorDriver for SimDriver {
    fn drive(&mut self, speed: f64) -> Result<(), HalError> {
        if !self.motor.shared.driver_online.load(Ordering::Relaxed) {
            return Err(HalError::DriverUnavailable);
        }
        let mut plant = self.motor.shared.plant.lock();
        plant.catch_up();
        plant.duty = hal::clamp_speed(speed);
        plant.braking = false;
        Ok(())
    }

    fn brake(&mut self) -> Result<(), HalError> {
        if !self.motor.shared.driver_online.load(Ordering::Relaxed) {
            return Err(HalError::DriverUnavailable);
        }
        let mut plant = self.motor.shared.plant.lock();
        plant.catch_up();
        plant.duty = 0.0;
        plant.braking = true;
        plant.velocity = 0.0;
        Ok(())
    }
}

pub struct SimEncoder {
    motor: SimulatedMotor,
}

impl Encoder for SimEncoder {
    fn count(&self) -> Result<i64, HalError> {
        if !self.motor.shared.encoder_online.load(Ordering::Relaxed) {
            return Err(HalError::EncoderUnavailable);
        }
        let raw = self.motor.position_counts().round() as i64;
        Ok(raw - self.motor.shared.zero.load(Ordering::Relaxed))
    }

    fn clear_count(&mut self) {
        let raw = self.motor.position_counts().round() as i64;
        self.motor.shared.zero.store(raw, Ordering::Relaxed);
    }
}

/// Encoder whose count is set by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEncoder {
    count: Arc<AtomicI64>,
    offline: Arc<AtomicBool>,
}

impl ScriptedEncoder {
    pub fn new(count: i64) -> Self {
        let encoder = Self::default();
        encoder.set(count);
        encoder
    }

    pub fn set(&self, count: i64) {
        self.count.store(count, Ordering::Relaxed);
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::Relaxed);
    }
}

impl Encoder for ScriptedEncoder {
    fn count(&self) -> Result<i64, HalError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(HalError::EncoderUnavailable);
        }
        Ok(self.count.load(Ordering::Relaxed))
    }

    fn clear_count(&mut self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Driver that logs every command it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    log: Arc<Mutex<Vec<DriveCommand>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<DriveCommand> {
        self.log.lock().clone()
    }

    pub fn last(&self) -> Option<DriveCommand> {
        self.log.lock().last().copied()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::Relaxed);
    }
}

impl MotorDriver for RecordingDriver {
    fn drive(&mut self, speed: f64) -> Result<(), HalError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(HalError::DriverUnavailable);
        }
        self.log.lock().push(DriveCommand::Drive(speed));
        Ok(())
    }

    fn brake(&mut self) -> Result<(), HalError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(HalError::DriverUnavailable);
        }
        self.log.lock().push(DriveCommand::Brake);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PlantModel {
        PlantModel {
            no_load_counts_per_sec: 1000.0,
            time_constant: 0.0,
        }
    }

    #[test]
    fn full_duty_moves_at_no_load_speed() {
        let motor = SimulatedMotor::new(model());
        motor.driver().drive(1.0).unwrap();
        motor.advance(Duration::from_millis(100));
        assert_eq!(motor.encoder().count().unwrap(), 100);
    }

    #[test]
    fn brake_stops_the_shaft() {
        let motor = SimulatedMotor::new(model());
        let mut driver = motor.driver();
        driver.drive(-0.5).unwrap();
        motor.advance(Duration::from_millis(200));
        driver.brake().unwrap();
        motor.advance(Duration::from_millis(200));
        assert_eq!(motor.encoder().count().unwrap(), -100);
        assert!(motor.is_braking());
    }

    #[test]
    fn lag_approaches_target_speed() {
        let motor = SimulatedMotor::new(PlantModel {
            no_load_counts_per_sec: 1000.0,
            time_constant: 0.1,
        });
        motor.driver().drive(1.0).unwrap();
        motor.advance(Duration::from_millis(20));
        let early = motor.velocity_counts_per_sec();
        for _ in 0..50 {
            motor.advance(Duration::from_millis(20));
        }
        assert!(early < 500.0);
        assert!((motor.velocity_counts_per_sec() - 1000.0).abs() < 1.0);
    }

    #[test]
    fn clear_count_rezeroes() {
        let motor = SimulatedMotor::new(model());
        motor.displace(40.0);
        let mut encoder = motor.encoder();
        encoder.clear_count();
        assert_eq!(encoder.count().unwrap(), 0);
        motor.displace(-3.0);
        assert_eq!(encoder.count().unwrap(), -3);
    }

    #[test]
    fn offline_collaborators_report_errors() {
        let motor = SimulatedMotor::new(model());
        motor.set_encoder_online(false);
        motor.set_driver_online(false);
        assert_eq!(motor.encoder().count(), Err(HalError::EncoderUnavailable));
        assert_eq!(motor.driver().brake(), Err(HalError::DriverUnavailable));
    }

    #[test]
    fn recording_driver_logs_commands() {
        let driver = RecordingDriver::new();
        let mut handle = driver.clone();
        handle.drive(0.25).unwrap();
        handle.brake().unwrap();
        assert_eq!(
            driver.commands(),
            vec![DriveCommand::Drive(0.25), DriveCommand::Brake]
        );
    }
}
