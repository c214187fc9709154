//! Knee flexion estimation from thigh and shank orientation
//!
//! Two strategies, fixed for the lifetime of a run:
//!
//! - **Vector**: angle between the two gravity directions plus the
//!   calibration offset, clamped to `[0, 180]`.
//! - **Quaternion**: Z component (intrinsic X-Y-Z Euler, degrees) of the
//!   rotation `shank * thigh^-1`, clamped to `[0, 180]`. No offset is applied;
//!   the reference pose is expected to be zeroed in the sensor stream.

use glam::Vec3;
use quaternion_core::Quaternion;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{JointError, JointResult};
use crate::lifecycle::LifecycleGate;
use crate::math::{angle_between_vectors, clamp, euler_xyz_degrees, relative_rotation};
use crate::types::SegmentState;

pub const MIN_FLEXION_DEGREES: f32 = 0.0;
pub const MAX_FLEXION_DEGREES: f32 = 180.0;

/// Orientation representation and flexion formula for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexionStrategy {
    #[default]
    Vector,
    Quaternion,
}

impl FlexionStrategy {
    pub fn name(self) -> &'static str {
        match self {
            FlexionStrategy::Vector => "vector",
            FlexionStrategy::Quaternion => "quaternion",
        }
    }

    /// Vector mode needs a calibration offset before it can report flexion
    pub fn requires_calibration(self) -> bool {
        matches!(self, FlexionStrategy::Vector)
    }
}

/// Vector-strategy flexion for two unit gravity directions
pub fn flexion_vector(thigh: Vec3, shank: Vec3, offset: f32) -> f32 {
    clamp(
        MIN_FLEXION_DEGREES,
        angle_between_vectors(thigh, shank) + offset,
        MAX_FLEXION_DEGREES,
    )
}

/// Quaternion-strategy flexion for two unit orientations
pub fn flexion_quaternion(thigh: Quaternion<f32>, shank: Quaternion<f32>) -> f32 {
    let euler = euler_xyz_degrees(relative_rotation(thigh, shank));
    clamp(MIN_FLEXION_DEGREES, euler[2], MAX_FLEXION_DEGREES)
}

pub struct FlexionCalculator {
    strategy: FlexionStrategy,
    gate: Arc<LifecycleGate>,
    debug: bool,
}

impl FlexionCalculator {
    pub fn new(strategy: FlexionStrategy, gate: Arc<LifecycleGate>, debug: bool) -> Self {
        Self { strategy, gate, debug }
    }

    pub fn strategy(&self) -> FlexionStrategy {
        self.strategy
    }

    /// Flexion angle in degrees, always within `[0, 180]`
    pub fn compute(&self, thigh: SegmentState, shank: SegmentState, offset: Option<f32>) -> JointResult<f32> {
        self.gate.require_active("compute")?;

        let flexion = match (self.strategy, thigh, shank) {
            (FlexionStrategy::Vector, SegmentState::Vector(t), SegmentState::Vector(s)) => {
                let offset = offset.ok_or_else(|| {
                    error!("Flexion requested before calibration");
                    JointError::NotCalibrated
                })?;
                flexion_vector(t, s, offset)
            }
            (FlexionStrategy::Quaternion, SegmentState::Quaternion(t), SegmentState::Quaternion(s)) => {
                flexion_quaternion(t, s)
            }
            (strategy, _, _) => {
                return Err(JointError::StrategyMismatch {
                    expected: strategy.name(),
                })
            }
        };

        // clamp passes NaN through; never hand it to the mapper
        if !flexion.is_finite() {
            error!("Non-finite flexion from {:?} / {:?}", thigh, shank);
            return Err(JointError::NonFiniteAngle);
        }

        if self.debug {
            info!("Flexion angle ({}): {:.2}°", self.strategy.name(), flexion);
        }
        Ok(flexion)
    }
}
