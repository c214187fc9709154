use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::LifecycleState;
use crate::types::{Channel, Segment};

/// Errors raised by the flexion engine and its controller
#[derive(Debug, Error)]
pub enum JointError {
    /// Operation attempted outside the active lifecycle window
    #[error("{operation} rejected: joint is not actuated (state: {state:?})")]
    NotActuated {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Acceleration sample could not be normalized
    #[error("Degenerate vector: norm {norm} cannot be normalized")]
    DegenerateVector { norm: f32 },

    /// Flexion requested before the reference pose was captured
    #[error("Flexion requested before calibration completed")]
    NotCalibrated,

    /// Sensor failed to attach within the bounded wait
    #[error("{segment} sensor failed to attach within {timeout:?}")]
    AttachmentTimeout { segment: Segment, timeout: Duration },

    /// Sample shape does not fit the channel it was delivered on
    #[error("Sample shape does not match the {channel:?} channel")]
    InvalidSample { channel: Channel },

    /// Segment state does not match the configured estimation strategy
    #[error("Segment state does not match the {expected} strategy")]
    StrategyMismatch { expected: &'static str },

    /// Computation produced NaN or infinity
    #[error("Flexion computation produced a non-finite angle")]
    NonFiniteAngle,

    /// Lifecycle transition not permitted from the current state
    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Sensor source stopped delivering samples
    #[error("{segment} sensor closed: {reason}")]
    SensorClosed { segment: Segment, reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for flexion engine operations
pub type JointResult<T> = Result<T, JointError>;

impl From<toml::de::Error> for JointError {
    fn from(err: toml::de::Error) -> Self {
        JointError::Config(err.to_string())
    }
}

impl From<std::io::Error> for JointError {
    fn from(err: std::io::Error) -> Self {
        JointError::Config(format!("I/O error: {}", err))
    }
}
