//! Linear mapping from flexion angle to actuator command.

use serde::{Deserialize, Serialize};

use crate::flexion::{MAX_FLEXION_DEGREES, MIN_FLEXION_DEGREES};
use crate::math::clamp;
use crate::types::{ActuatorCommand, GaitLabel};

pub const DEFAULT_COMMAND_MIN: u8 = 31;
pub const DEFAULT_COMMAND_MAX: u8 = 255;

/// Maps `[0, 180]` degrees onto `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMapper {
    pub min: u8,
    pub max: u8,
}

impl Default for CommandMapper {
    fn default() -> Self {
        Self {
            min: DEFAULT_COMMAND_MIN,
            max: DEFAULT_COMMAND_MAX,
        }
    }
}

impl CommandMapper {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Command for `angle` degrees
    ///
    /// The result is clamped into `[min, max]` even though in-range angles
    /// already land there. NaN maps to `min`.
    pub fn map(&self, angle: f32) -> u8 {
        if angle.is_nan() {
            return self.min;
        }
        let min = self.min as f32;
        let max = self.max as f32;
        let span = MAX_FLEXION_DEGREES - MIN_FLEXION_DEGREES;
        let raw = min + ((angle - MIN_FLEXION_DEGREES) * (max - min)) / span;
        clamp(min, raw.round(), max) as u8
    }

    /// Neutral output sent on shutdown: the command for a straight knee
    pub fn neutral(&self) -> u8 {
        self.min
    }

    /// Full decision for one tick: hold on idle, otherwise drive to the angle
    pub fn command(&self, angle: f32, label: &GaitLabel) -> ActuatorCommand {
        if label.is_stationary() {
            ActuatorCommand::Stop
        } else {
            ActuatorCommand::Drive(self.map(angle))
        }
    }
}
