use serde::Deserialize;

/// Gain triple for one PID unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PidGains {
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Fixed-interval PID unit.
///
/// The caller guarantees `compute` runs once per `sample_time` seconds;
/// there is no internal timestamping. The derivative acts on the measured
/// value rather than on the error, so a setpoint step does not kick the
/// output. Output is not clamped here.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    sample_time: f64,
    integral: f64,
    integral_limit: Option<f64>,
    prev_measured: f64,
    primed: bool,
}

impl PidController {
    pub fn new(gains: PidGains, sample_time: f64) -> Self {
        Self {
            gains,
            sample_time,
            integral: 0.0,
            integral_limit: None,
            prev_measured: 0.0,
            primed: false,
        }
    }

    /// Bound the accumulated integral to `[-limit, limit]`.
    pub fn with_integral_limit(mut self, limit: Option<f64>) -> Self {
        self.integral_limit = limit;
        self
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Replace the gains. Integrator and derivative memory are kept.
    pub fn set_tunings(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measured = 0.0;
        self.primed = false;
    }

    pub fn compute(&mut self, measured: f64, setpoint: f64) -> f64 {
        let error = setpoint - measured;

        let derivative = if self.primed {
            -(measured - self.prev_measured) / self.sample_time
        } else {
            0.0
        };

        let output =
            (self.gains.kp * error) + (self.gains.ki * self.integral) + (self.gains.kd * derivative);

        // Integrate after forming the output: the first sample after a
        // reset contributes no integral term.
        self.integral += error * self.sample_time;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        self.prev_measured = measured;
        self.primed = true;

        output
    }
}
