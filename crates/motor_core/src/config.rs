use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pid::PidGains;
use crate::units::GearScale;
use crate::velocity::VelocityEstimator;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub encoder_counts_per_rev: f64,
    pub gear_ratio: f64,
    pub interval_ms: u64,
    /// Position dead-band, in encoder counts.
    pub deadband_counts: i64,
    pub velocity_window: usize,
    pub position_pid: PidGains,
    pub speed_pid: PidGains,
    pub integral_limit: Option<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            encoder_counts_per_rev: 28.0,
            gear_ratio: 29.0,
            interval_ms: 20,
            deadband_counts: 1,
            velocity_window: VelocityEstimator::DEFAULT_WINDOW,
            position_pid: PidGains::default(),
            speed_pid: PidGains::default(),
            integral_limit: None,
        }
    }
}

impl ControllerConfig {
    pub fn new(gear_ratio: f64) -> Self {
        Self {
            gear_ratio,
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn with_counts_per_rev(mut self, counts: f64) -> Self {
        self.encoder_counts_per_rev = counts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_deadband(mut self, counts: i64) -> Self {
        self.deadband_counts = counts;
        self
    }

    pub fn with_velocity_window(mut self, window: usize) -> Self {
        self.velocity_window = window;
        self
    }

    pub fn with_position_pid(mut self, gains: PidGains) -> Self {
        self.position_pid = gains;
        self
    }

    pub fn with_speed_pid(mut self, gains: PidGains) -> Self {
        self.speed_pid = gains;
        self
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn scale(&self) -> GearScale {
        GearScale::new(self.encoder_counts_per_rev, self.gear_ratio, self.interval())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gear_ratio.is_finite() && self.gear_ratio > 0.0) {
            return Err(ConfigError::InvalidGearRatio(self.gear_ratio));
        }
        if !(self.encoder_counts_per_rev.is_finite() && self.encoder_counts_per_rev > 0.0) {
            return Err(ConfigError::InvalidCountsPerRev(self.encoder_counts_per_rev));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.velocity_window == 0 {
            return Err(ConfigError::InvalidWindow);
        }
        if self.deadband_counts < 0 {
            return Err(ConfigError::InvalidDeadband(self.deadband_counts));
        }
        if let Some(limit) = self.integral_limit {
            if !(limit > 0.0) {
                return Err(ConfigError::InvalidIntegralLimit(limit));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Threaded,
    Async,
    Both,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Rotate by `target` turns.
    Position,
    /// Spin at `target` turns per second.
    Speed,
}

/// Benchmark/demo run description.
#[derive(Debug, Deserialize, Clone)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    pub duration_secs: u64,
    pub scheduler: SchedulerKind,
    pub scenario: Scenario,
    pub target: f64,
    #[serde(default)]
    pub cpu_load_threads: usize,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    #[serde(default)]
    pub controller: ControllerConfig,
}

fn default_output_prefix() -> String {
    "cycles".to_string()
}

impl ExperimentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ExperimentConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: ControllerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.interval(), Duration::from_millis(20));
        assert_eq!(config.scale().counts_per_turn(), 812.0);
    }

    #[test]
    fn parses_nested_gains() {
        let config: ControllerConfig = toml::from_str(
            r#"
            gear_ratio = 50.0
            interval_ms = 10
            deadband_counts = 3
            integral_limit = 20.0

            [position_pid]
            kp = 0.01
            ki = 0.002

            [speed_pid]
            kp = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(config.gear_ratio, 50.0);
        assert_eq!(config.interval_ms, 10);
        assert_eq!(config.deadband_counts, 3);
        assert_eq!(config.position_pid, PidGains::new(0.01, 0.002, 0.0));
        assert_eq!(config.speed_pid, PidGains::new(0.05, 0.0, 0.0));
        assert_eq!(config.integral_limit, Some(20.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_gear_ratio() {
        for ratio in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let err = ControllerConfig::new(ratio).validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidGearRatio(_)));
        }
    }

    #[test]
    fn rejects_zero_interval_and_window() {
        let err = ControllerConfig::default()
            .with_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval));

        let err = ControllerConfig::default()
            .with_velocity_window(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWindow));
    }

    #[test]
    fn rejects_negative_deadband_and_limit() {
        let err = ControllerConfig::default().with_deadband(-1).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeadband(-1)));

        let err = ControllerConfig::default()
            .with_integral_limit(0.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIntegralLimit(_)));
    }

    #[test]
    fn parses_experiment() {
        let config: ExperimentConfig = toml::from_str(
            r#"
            experiment_name = "quarter_turns"
            duration_secs = 3
            scheduler = "both"
            scenario = "position"
            target = 0.25

            [controller]
            gear_ratio = 29.0
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler, SchedulerKind::Both);
        assert_eq!(config.scenario, Scenario::Position);
        assert_eq!(config.output_prefix, "cycles");
        assert_eq!(config.controller.interval_ms, 20);
    }
}
