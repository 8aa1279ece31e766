use crate::error::HalError;

pub const MIN_SPEED: f64 = -1.0;
pub const MAX_SPEED: f64 = 1.0;

/// Duty-cycle/brake primitive of the physical motor driver.
pub trait MotorDriver: Send {
    /// `speed` in `[-1, 1]`, positive is the driver's configured forward.
    fn drive(&mut self, speed: f64) -> Result<(), HalError>;

    /// Stop the motor; active brake or coast is up to the driver.
    fn brake(&mut self) -> Result<(), HalError>;
}

/// Quadrature count accumulator.
///
/// `count` takes `&self` and must not block: the control cycle reads it
/// outside the controller lock.
pub trait Encoder: Send + Sync {
    /// Signed count since the last clear. Behaviour at integer wrap-around
    /// is unspecified.
    fn count(&self) -> Result<i64, HalError>;

    fn clear_count(&mut self);
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn drive(&mut self, speed: f64) -> Result<(), HalError> {
        (**self).drive(speed)
    }

    fn brake(&mut self) -> Result<(), HalError> {
        (**self).brake()
    }
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn count(&self) -> Result<i64, HalError> {
        (**self).count()
    }

    fn clear_count(&mut self) {
        (**self).clear_count()
    }
}

/// Clamp a duty command into `[MIN_SPEED, MAX_SPEED]`. NaN becomes 0.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return 0.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}
