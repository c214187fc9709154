//! Per-segment orientation state and recent sample history
//!
//! Sensor callbacks write here from their own threads while the control loop
//! reads. Each segment state and each history buffer is behind its own short
//! lock so a reader always sees a whole vector or quaternion.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{JointError, JointResult};
use crate::flexion::FlexionStrategy;
use crate::history::BoundedHistory;
use crate::lifecycle::LifecycleGate;
use crate::math::{normalize_vector, quaternion_norm};
use crate::types::{
    Channel, FeatureRow, OrientationSample, Segment, SegmentState, SpatialReading,
};

/// Quaternions further than this from unit norm are reported, not corrected
const QUATERNION_NORM_TOLERANCE: f32 = 1e-3;

struct SegmentChannels {
    state: Mutex<SegmentState>,
    acceleration: Mutex<BoundedHistory<[f32; 3]>>,
    angular_rate: Mutex<BoundedHistory<[f32; 3]>>,
}

impl SegmentChannels {
    fn new(initial: SegmentState, capacity: usize) -> Self {
        Self {
            state: Mutex::new(initial),
            acceleration: Mutex::new(BoundedHistory::new(capacity)),
            angular_rate: Mutex::new(BoundedHistory::new(capacity)),
        }
    }

    fn history(&self, channel: Channel) -> Option<&Mutex<BoundedHistory<[f32; 3]>>> {
        match channel {
            Channel::Acceleration => Some(&self.acceleration),
            Channel::AngularRate => Some(&self.angular_rate),
            Channel::Orientation => None,
        }
    }
}

/// Orientation state and history for the thigh and shank sensors
pub struct OrientationEstimator {
    strategy: FlexionStrategy,
    gate: Arc<LifecycleGate>,
    thigh: SegmentChannels,
    shank: SegmentChannels,
}

impl OrientationEstimator {
    pub fn new(strategy: FlexionStrategy, history_capacity: usize, gate: Arc<LifecycleGate>) -> Self {
        let initial = match strategy {
            FlexionStrategy::Vector => SegmentState::INITIAL_VECTOR,
            FlexionStrategy::Quaternion => SegmentState::INITIAL_QUATERNION,
        };
        Self {
            strategy,
            gate,
            thigh: SegmentChannels::new(initial, history_capacity),
            shank: SegmentChannels::new(initial, history_capacity),
        }
    }

    pub fn strategy(&self) -> FlexionStrategy {
        self.strategy
    }

    fn channels(&self, segment: Segment) -> &SegmentChannels {
        match segment {
            Segment::Thigh => &self.thigh,
            Segment::Shank => &self.shank,
        }
    }

    /// Apply one sample for a (segment, channel) pair
    ///
    /// Acceleration and angular-rate samples are always buffered. Segment
    /// state follows acceleration in vector mode and the orientation channel
    /// in quaternion mode; other combinations only buffer.
    pub fn update(&self, segment: Segment, channel: Channel, sample: OrientationSample) -> JointResult<()> {
        self.gate.require_active("update")?;

        match (channel, sample) {
            (Channel::Acceleration, OrientationSample::Vector(raw)) => {
                self.buffer(segment, channel, raw);
                if self.strategy == FlexionStrategy::Vector {
                    self.apply_acceleration(segment, raw)?;
                }
                Ok(())
            }
            (Channel::AngularRate, OrientationSample::Vector(raw)) => {
                self.buffer(segment, channel, raw);
                Ok(())
            }
            (Channel::Orientation, OrientationSample::Quaternion(q)) => {
                if self.strategy == FlexionStrategy::Quaternion {
                    self.apply_quaternion(segment, q);
                } else {
                    debug!("Ignoring {} quaternion in vector mode", segment);
                }
                Ok(())
            }
            _ => {
                error!("{} sample does not match the {:?} channel", segment, channel);
                Err(JointError::InvalidSample { channel })
            }
        }
    }

    /// Sensor callback path: buffer both channels, then refresh segment state
    pub fn ingest(&self, segment: Segment, reading: &SpatialReading) -> JointResult<()> {
        self.gate.require_active("ingest")?;

        self.buffer(segment, Channel::AngularRate, reading.angular_rate);
        self.buffer(segment, Channel::Acceleration, reading.acceleration);

        match self.strategy {
            FlexionStrategy::Vector => self.apply_acceleration(segment, reading.acceleration),
            FlexionStrategy::Quaternion => match reading.quaternion {
                Some([w, x, y, z]) => {
                    self.apply_quaternion(segment, (w, [x, y, z]));
                    Ok(())
                }
                None => {
                    warn!("{} reading carried no quaternion; orientation unchanged", segment);
                    Ok(())
                }
            },
        }
    }

    fn buffer(&self, segment: Segment, channel: Channel, raw: [f32; 3]) {
        if let Some(history) = self.channels(segment).history(channel) {
            history.lock().append(raw);
        }
    }

    fn apply_acceleration(&self, segment: Segment, raw: [f32; 3]) -> JointResult<()> {
        match normalize_vector(raw) {
            Ok(unit) => {
                *self.channels(segment).state.lock() = SegmentState::Vector(unit);
                Ok(())
            }
            Err(e) => {
                error!("{} acceleration {:?} rejected, keeping previous orientation: {}", segment, raw, e);
                Err(e)
            }
        }
    }

    fn apply_quaternion(&self, segment: Segment, q: quaternion_core::Quaternion<f32>) {
        let norm = quaternion_norm(q);
        if (norm - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
            warn!("{} quaternion norm {} is not unit; using as delivered", segment, norm);
        }
        *self.channels(segment).state.lock() = SegmentState::Quaternion(q);
    }

    /// Latest orientation of `segment`
    pub fn segment_state(&self, segment: Segment) -> SegmentState {
        *self.channels(segment).state.lock()
    }

    /// Oldest-first copy of a buffered channel; empty for the orientation channel
    pub fn history(&self, segment: Segment, channel: Channel) -> Vec<[f32; 3]> {
        self.channels(segment)
            .history(channel)
            .map(|history| history.lock().snapshot())
            .unwrap_or_default()
    }

    /// Both acceleration and angular-rate buffers are at capacity
    pub fn is_warmed_up(&self, segment: Segment) -> bool {
        let channels = self.channels(segment);
        channels.acceleration.lock().is_full() && channels.angular_rate.lock().is_full()
    }

    /// Classifier window for `segment`: acceleration then angular rate, oldest first
    pub fn feature_window(&self, segment: Segment) -> Vec<FeatureRow> {
        let acceleration = self.history(segment, Channel::Acceleration);
        let angular_rate = self.history(segment, Channel::AngularRate);
        acceleration
            .iter()
            .zip(angular_rate.iter())
            .map(|(a, g)| [a[0], a[1], a[2], g[0], g[1], g[2]])
            .collect()
    }
}
