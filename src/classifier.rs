//! Threshold gait classifier for dry runs without a trained model.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::GaitClassifier;
use crate::types::{FeatureRow, GaitLabel};

/// Labels a window idle when the shank barely rotates, otherwise forward or
/// backward by the sign of the mean angular rate about `swing_axis`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionThresholdClassifier {
    /// Mean angular-rate magnitude below which the wearer is idle (rad/s)
    pub idle_threshold: f32,
    /// Angular-rate component (0 = x, 1 = y, 2 = z) aligned with the swing
    pub swing_axis: usize,
}

impl Default for MotionThresholdClassifier {
    fn default() -> Self {
        Self {
            idle_threshold: 0.15,
            swing_axis: 2,
        }
    }
}

impl GaitClassifier for MotionThresholdClassifier {
    fn predict(&mut self, window: &[FeatureRow]) -> GaitLabel {
        if window.is_empty() {
            return GaitLabel::Idle;
        }
        let count = window.len() as f32;
        let axis = 3 + self.swing_axis.min(2);

        let mean_magnitude = window
            .iter()
            .map(|row| (row[3] * row[3] + row[4] * row[4] + row[5] * row[5]).sqrt())
            .sum::<f32>()
            / count;
        let mean_swing = window.iter().map(|row| row[axis]).sum::<f32>() / count;

        let label = if mean_magnitude < self.idle_threshold {
            GaitLabel::Idle
        } else if mean_swing >= 0.0 {
            GaitLabel::Forward
        } else {
            GaitLabel::Backward
        };
        debug!("Gait window |w|={:.3} swing={:.3} -> {}", mean_magnitude, mean_swing, label);
        label
    }
}
