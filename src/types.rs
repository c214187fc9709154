//! Core sample and state types shared by the estimator, calculator and controller.

use glam::Vec3;
use quaternion_core::Quaternion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor-bearing body part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Thigh,
    Shank,
}

impl Segment {
    pub const ALL: [Segment; 2] = [Segment::Thigh, Segment::Shank];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Thigh => write!(f, "thigh"),
            Segment::Shank => write!(f, "shank"),
        }
    }
}

/// Sensor channel a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Acceleration,
    AngularRate,
    Orientation,
}

/// One sample for a single (segment, channel) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationSample {
    /// Acceleration or angular rate
    Vector([f32; 3]),
    /// Unit quaternion in (w, [x, y, z]) form
    Quaternion(Quaternion<f32>),
}

impl OrientationSample {
    pub fn quaternion(w: f32, x: f32, y: f32, z: f32) -> Self {
        OrientationSample::Quaternion((w, [x, y, z]))
    }
}

/// Full payload delivered by a sensor callback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialReading {
    pub acceleration: [f32; 3],
    pub angular_rate: [f32; 3],
    /// Carried through from the sensor, unused by the flexion engine
    pub magnetic_field: [f32; 3],
    /// Sensor timestamp in milliseconds
    pub timestamp_ms: f64,
    /// On-board fused orientation, present when the sensor streams quaternions
    pub quaternion: Option<[f32; 4]>,
}

impl SpatialReading {
    pub fn new(acceleration: [f32; 3], angular_rate: [f32; 3], timestamp_ms: f64) -> Self {
        Self {
            acceleration,
            angular_rate,
            magnetic_field: [0.0; 3],
            timestamp_ms,
            quaternion: None,
        }
    }

    pub fn with_quaternion(mut self, wxyz: [f32; 4]) -> Self {
        self.quaternion = Some(wxyz);
        self
    }
}

/// Current orientation of one segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentState {
    /// Normalized gravity direction
    Vector(Vec3),
    /// Unit orientation quaternion
    Quaternion(Quaternion<f32>),
}

impl SegmentState {
    pub const INITIAL_VECTOR: SegmentState = SegmentState::Vector(Vec3::Z);
    pub const INITIAL_QUATERNION: SegmentState = SegmentState::Quaternion((1.0, [0.0, 0.0, 0.0]));
}

/// Command dispatched to the actuator driver for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorCommand {
    Drive(u8),
    Stop,
}

/// Movement class returned by the gait classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaitLabel {
    Idle,
    Forward,
    Backward,
    Other(String),
}

impl GaitLabel {
    /// Only the idle label holds the actuator at its stop position
    pub fn is_stationary(&self) -> bool {
        matches!(self, GaitLabel::Idle)
    }
}

impl fmt::Display for GaitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaitLabel::Idle => write!(f, "idle"),
            GaitLabel::Forward => write!(f, "forward"),
            GaitLabel::Backward => write!(f, "backward"),
            GaitLabel::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One classifier feature row: acceleration followed by angular rate
pub type FeatureRow = [f32; 6];
