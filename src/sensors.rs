//! Sensor sources fed from channels
//!
//! `ChannelSensor` turns a crossbeam receiver into a `SensorSource`: a
//! dedicated thread drains the channel and forwards each reading to the
//! registered handler. Hardware bridges, log replay and the gait simulator
//! all push into the sending side.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

use crate::collaborators::{SegmentHandler, SensorSource};
use crate::error::{JointError, JointResult};
use crate::types::{Segment, SpatialReading};

/// How often the delivery thread re-checks the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const GRAVITY: f32 = 9.81;

pub struct ChannelSensor {
    segment: Segment,
    receiver: Receiver<SpatialReading>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ChannelSensor {
    pub fn new(segment: Segment, receiver: Receiver<SpatialReading>) -> Self {
        Self {
            segment,
            receiver,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl SensorSource for ChannelSensor {
    fn segment(&self) -> Segment {
        self.segment
    }

    /// Attachment completes when the first reading arrives
    fn open(&mut self, timeout: Duration, handler: SegmentHandler) -> JointResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let first = match self.receiver.recv_timeout(timeout) {
            Ok(reading) => reading,
            Err(RecvTimeoutError::Timeout) => {
                error!("{} sensor did not attach within {:?}", self.segment, timeout);
                return Err(JointError::AttachmentTimeout {
                    segment: self.segment,
                    timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("{} sensor stream closed before attaching", self.segment);
                return Err(JointError::SensorClosed {
                    segment: self.segment,
                    reason: "stream closed before attachment".to_string(),
                });
            }
        };
        info!("{} sensor attached", self.segment);
        handler.on_reading(first);

        self.stop.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&self.stop);
        let receiver = self.receiver.clone();
        let worker = std::thread::Builder::new()
            .name(format!("{}-sensor", self.segment))
            .spawn(move || loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(reading) => handler.on_reading(reading),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        if !stop.load(Ordering::SeqCst) {
                            handler.on_disconnect("sample stream ended");
                        }
                        break;
                    }
                }
            })
            .map_err(|e| spawn_failure(self.segment, e))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("{} sensor thread panicked", self.segment);
            }
            info!("{} sensor disconnected", self.segment);
        }
    }
}

/// A delivery thread that never started leaves the stream unread
fn spawn_failure(segment: Segment, err: std::io::Error) -> JointError {
    error!("{} sensor delivery thread failed to start: {}", segment, err);
    JointError::SensorClosed {
        segment,
        reason: format!("delivery thread failed to start: {}", err),
    }
}

impl Drop for ChannelSensor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Synthetic walking knee for dry runs
///
/// Flexion follows `peak/2 * (1 - cos(2*pi*t/period))`. The thigh stays
/// vertical; the shank's gravity vector tilts by the flexion angle and its
/// orientation quaternion turns about Z by the same angle.
#[derive(Debug, Clone, Copy)]
pub struct GaitSimulator {
    pub stride_period_secs: f32,
    pub peak_flexion_degrees: f32,
}

impl Default for GaitSimulator {
    fn default() -> Self {
        Self {
            stride_period_secs: 1.2,
            peak_flexion_degrees: 60.0,
        }
    }
}

impl GaitSimulator {
    pub fn flexion_at(&self, t_secs: f32) -> f32 {
        let phase = 2.0 * PI * t_secs / self.stride_period_secs;
        0.5 * self.peak_flexion_degrees * (1.0 - phase.cos())
    }

    fn flexion_rate_at(&self, t_secs: f32) -> f32 {
        let omega = 2.0 * PI / self.stride_period_secs;
        0.5 * self.peak_flexion_degrees.to_radians() * omega * (omega * t_secs).sin()
    }

    pub fn reading(&self, segment: Segment, t_secs: f32) -> SpatialReading {
        let timestamp_ms = (t_secs as f64) * 1000.0;
        match segment {
            Segment::Thigh => SpatialReading::new([0.0, 0.0, GRAVITY], [0.0; 3], timestamp_ms)
                .with_quaternion([1.0, 0.0, 0.0, 0.0]),
            Segment::Shank => {
                let theta = self.flexion_at(t_secs).to_radians();
                let half = theta / 2.0;
                SpatialReading::new(
                    [GRAVITY * theta.sin(), 0.0, GRAVITY * theta.cos()],
                    [0.0, 0.0, self.flexion_rate_at(t_secs)],
                    timestamp_ms,
                )
                .with_quaternion([half.cos(), 0.0, 0.0, half.sin()])
            }
        }
    }
}
