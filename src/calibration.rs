//! Reference-pose calibration
//!
//! Captured once per run with the knee fully extended. In vector mode the
//! angle between the two gravity directions becomes the offset added to every
//! later flexion estimate. Quaternion mode carries no standalone offset.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{JointError, JointResult};
use crate::flexion::FlexionStrategy;
use crate::lifecycle::LifecycleGate;
use crate::math::{angle_between_vectors, relative_rotation_angle};
use crate::types::SegmentState;

/// Largest total thigh/shank rotation accepted as "zeroed" in quaternion mode
const REFERENCE_POSE_TOLERANCE_DEGREES: f32 = 5.0;

/// Snapshot of one calibration, emitted to the log as JSON
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub offset_degrees: f32,
    pub thigh: [f32; 3],
    pub shank: [f32; 3],
}

pub struct CalibrationUnit {
    strategy: FlexionStrategy,
    gate: Arc<LifecycleGate>,
    offset: Mutex<Option<f32>>,
}

impl CalibrationUnit {
    pub fn new(strategy: FlexionStrategy, gate: Arc<LifecycleGate>) -> Self {
        Self {
            strategy,
            gate,
            offset: Mutex::new(None),
        }
    }

    /// Capture the reference offset from the current segment states
    ///
    /// Returns the stored offset, which stays `None` in quaternion mode.
    /// Calling again overwrites the previous offset.
    pub fn calibrate(&self, thigh: SegmentState, shank: SegmentState) -> JointResult<Option<f32>> {
        self.gate.require_active("calibrate")?;

        match (self.strategy, thigh, shank) {
            (FlexionStrategy::Vector, SegmentState::Vector(t), SegmentState::Vector(s)) => {
                let offset = angle_between_vectors(t, s);
                if !offset.is_finite() {
                    warn!("Calibration produced a non-finite offset; keeping previous value");
                    return Err(JointError::NonFiniteAngle);
                }
                *self.offset.lock() = Some(offset);

                let record = CalibrationRecord {
                    offset_degrees: offset,
                    thigh: t.to_array(),
                    shank: s.to_array(),
                };
                match serde_json::to_string(&record) {
                    Ok(json) => info!("Calibrated angle: {:.2}° {}", offset, json),
                    Err(_) => info!("Calibrated angle: {:.2}°", offset),
                }
                Ok(Some(offset))
            }
            (FlexionStrategy::Quaternion, SegmentState::Quaternion(t), SegmentState::Quaternion(s)) => {
                let residual = relative_rotation_angle(t, s);
                if residual > REFERENCE_POSE_TOLERANCE_DEGREES {
                    warn!(
                        "Quaternion streams disagree by {:.2}° in the reference pose; flexion will carry that bias",
                        residual
                    );
                } else {
                    info!("Quaternion reference pose residual {:.2}°, no offset captured", residual);
                }
                Ok(None)
            }
            (strategy, _, _) => Err(JointError::StrategyMismatch {
                expected: strategy.name(),
            }),
        }
    }

    /// Current offset, `None` until a vector-mode calibration has run
    pub fn offset(&self) -> Option<f32> {
        *self.offset.lock()
    }
}
