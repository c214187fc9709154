//! Knee Joint Flexion Engine
//!
//! Estimates the flexion angle of a powered knee from two IMUs (thigh and
//! shank), maps it to an actuator command, and gates the actuator on the
//! wearer's gait phase. Sensors, the gait classifier and the actuator driver
//! are injected through the traits in [`collaborators`].

pub mod actuator;
pub mod calibration;
pub mod classifier;
pub mod collaborators;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod flexion;
pub mod history;
pub mod lifecycle;
pub mod logging;
pub mod math;
pub mod sensors;
pub mod types;

// Re-export commonly used types
pub use collaborators::{ActuatorDriver, GaitClassifier, SegmentHandler, SensorSource};
pub use command::CommandMapper;
pub use config::JointConfig;
pub use controller::{CancellationToken, JointController, TickOutcome};
pub use error::{JointError, JointResult};
pub use estimator::OrientationEstimator;
pub use flexion::{FlexionCalculator, FlexionStrategy};
pub use history::BoundedHistory;
pub use lifecycle::{LifecycleGate, LifecycleState};
pub use types::{ActuatorCommand, Channel, FeatureRow, GaitLabel, OrientationSample, Segment, SegmentState, SpatialReading};
