//! Interfaces to the hardware and model the joint controller depends on
//!
//! The controller owns one source per segment, one classifier and one
//! actuator driver, all injected at construction.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::JointResult;
use crate::estimator::OrientationEstimator;
use crate::lifecycle::LifecycleGate;
use crate::types::{FeatureRow, GaitLabel, Segment, SpatialReading};

/// A sensor strapped to one segment
///
/// Implementations must deliver readings for their segment one at a time;
/// different segments may deliver concurrently.
pub trait SensorSource: Send {
    fn segment(&self) -> Segment;

    /// Attach the sensor, waiting at most `timeout`, then start delivering
    /// readings to `handler`
    fn open(&mut self, timeout: Duration, handler: SegmentHandler) -> JointResult<()>;

    /// Stop delivery and release the device; safe to call more than once
    fn close(&mut self);
}

/// Predicts the wearer's movement from a window of shank features
pub trait GaitClassifier: Send {
    /// `window` rows are `[ax, ay, az, gx, gy, gz]`, oldest first
    fn predict(&mut self, window: &[FeatureRow]) -> GaitLabel;
}

/// Output stage that drives the physical actuator
pub trait ActuatorDriver: Send {
    fn send(&mut self, command: u8);
    fn send_stop(&mut self);
}

/// Callback registered with a sensor source for one segment
#[derive(Clone)]
pub struct SegmentHandler {
    segment: Segment,
    estimator: Arc<OrientationEstimator>,
    gate: Arc<LifecycleGate>,
}

impl SegmentHandler {
    pub fn new(segment: Segment, estimator: Arc<OrientationEstimator>, gate: Arc<LifecycleGate>) -> Self {
        Self {
            segment,
            estimator,
            gate,
        }
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Feed one reading into the estimator
    ///
    /// Failures are logged by the estimator; the sensor thread keeps running.
    pub fn on_reading(&self, reading: SpatialReading) {
        if let Err(e) = self.estimator.ingest(self.segment, &reading) {
            debug!("{} reading at {}ms dropped: {}", self.segment, reading.timestamp_ms, e);
        }
    }

    /// The source lost its device; terminates the run
    pub fn on_disconnect(&self, reason: &str) {
        warn!("{} sensor disconnected: {}", self.segment, reason);
        self.gate.fail(self.segment, reason);
    }
}
