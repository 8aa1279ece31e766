use thiserror::Error;

/// Rejected controller configuration. Construction fails on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("gear ratio must be positive and finite, got {0}")]
    InvalidGearRatio(f64),
    #[error("encoder counts per revolution must be positive and finite, got {0}")]
    InvalidCountsPerRev(f64),
    #[error("control interval must be at least 1 ms")]
    InvalidInterval,
    #[error("velocity window must hold at least one sample")]
    InvalidWindow,
    #[error("dead-band must not be negative, got {0}")]
    InvalidDeadband(i64),
    #[error("integral limit must be positive, got {0}")]
    InvalidIntegralLimit(f64),
}

/// Failure reported by an external collaborator (encoder or motor driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HalError {
    #[error("encoder unavailable")]
    EncoderUnavailable,
    #[error("motor driver unavailable")]
    DriverUnavailable,
}

/// Why a control cycle did not end with its command applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    /// Encoder unreadable; nothing was computed.
    #[error("cycle skipped: {0}")]
    Skipped(#[from] HalError),
    /// The cycle ran but the actuator rejected its command.
    #[error("command failed: {0}")]
    CommandFailed(HalError),
}
