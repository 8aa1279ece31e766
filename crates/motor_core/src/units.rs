//! Angle and angular-speed units around the canonical (turns, counts) pair.
//!
//! Every unit is a pure linear factor on turns, applied the same way in
//! both directions, so `from_turns(to_turns(x))` only ever loses what the
//! float multiply/divide loses.

use std::f64::consts::TAU;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Turns,
    Radians,
    Degrees,
}

impl AngleUnit {
    fn per_turn(self) -> f64 {
        match self {
            AngleUnit::Turns => 1.0,
            AngleUnit::Radians => TAU,
            AngleUnit::Degrees => 360.0,
        }
    }

    pub fn to_turns(self, value: f64) -> f64 {
        match self {
            AngleUnit::Turns => value,
            unit => value / unit.per_turn(),
        }
    }

    pub fn from_turns(self, turns: f64) -> f64 {
        match self {
            AngleUnit::Turns => turns,
            unit => unit.per_turn() * turns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    /// Turns per second (Hz).
    TurnsPerSec,
    RadiansPerSec,
    DegreesPerSec,
    Rpm,
}

impl SpeedUnit {
    fn per_turn_per_sec(self) -> f64 {
        match self {
            SpeedUnit::TurnsPerSec => 1.0,
            SpeedUnit::RadiansPerSec => TAU,
            SpeedUnit::DegreesPerSec => 360.0,
            SpeedUnit::Rpm => 60.0,
        }
    }

    pub fn to_turns_per_sec(self, value: f64) -> f64 {
        match self {
            SpeedUnit::TurnsPerSec => value,
            unit => value / unit.per_turn_per_sec(),
        }
    }

    pub fn from_turns_per_sec(self, turns_per_sec: f64) -> f64 {
        match self {
            SpeedUnit::TurnsPerSec => turns_per_sec,
            unit => unit.per_turn_per_sec() * turns_per_sec,
        }
    }
}

/// Counts-per-output-turn scale plus the control interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearScale {
    counts_per_turn: f64,
    interval_secs: f64,
}

impl GearScale {
    pub fn new(encoder_counts_per_rev: f64, gear_ratio: f64, interval: Duration) -> Self {
        Self {
            counts_per_turn: encoder_counts_per_rev * gear_ratio,
            interval_secs: interval.as_secs_f64(),
        }
    }

    pub fn counts_per_turn(&self) -> f64 {
        self.counts_per_turn
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    /// Nearest whole count.
    pub fn turns_to_counts(&self, turns: f64) -> i64 {
        (turns * self.counts_per_turn).round() as i64
    }

    pub fn counts_to_turns(&self, counts: i64) -> f64 {
        counts as f64 / self.counts_per_turn
    }

    pub fn turns_per_sec_to_counts_per_interval(&self, turns_per_sec: f64) -> f64 {
        turns_per_sec * self.counts_per_turn * self.interval_secs
    }

    pub fn counts_per_interval_to_turns_per_sec(&self, counts_per_interval: f64) -> f64 {
        counts_per_interval / (self.counts_per_turn * self.interval_secs)
    }

    /// Rate of a delta measured over `window` intervals, in turns per second.
    pub fn window_delta_to_turns_per_sec(&self, delta: i64, window: usize) -> f64 {
        self.counts_per_interval_to_turns_per_sec(delta as f64 / window as f64)
    }
}
