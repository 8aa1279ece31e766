//! Closed-loop position and speed control of one encoder-equipped gear-motor.
//!
//! [`Controller`] is the lock-protected command surface. Scheduling the
//! periodic control cycle is left to the `threaded_impl` and `async_impl`
//! crates.

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod hal;
pub mod metrics;
pub mod pid;
pub mod sim;
pub mod state;
pub mod units;
pub mod velocity;

pub use config::{ControllerConfig, ExperimentConfig};
pub use controller::{Controller, CycleReport};
pub use diagnostics::{DiagnosticsSnapshot, SharedDiagnostics};
pub use error::{ConfigError, CycleError, HalError};
pub use hal::{Encoder, MotorDriver};
pub use metrics::{CycleRecord, CycleRecorder};
pub use pid::{PidController, PidGains};
pub use state::{ControlMode, DriveCommand, ModeKind};
pub use units::{AngleUnit, GearScale, SpeedUnit};
pub use velocity::VelocityEstimator;
