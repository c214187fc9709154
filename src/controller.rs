//! Joint controller: lifecycle, calibration and the periodic control tick
//!
//! `start` attaches the sensors and captures the reference pose, `tick` runs
//! one classify/estimate/dispatch cycle, and `stop` releases the sensors and
//! parks the actuator. `run` is a tokio-driven loop over `tick` that exits
//! when its cancellation token fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::calibration::CalibrationUnit;
use crate::collaborators::{ActuatorDriver, GaitClassifier, SegmentHandler, SensorSource};
use crate::command::CommandMapper;
use crate::config::JointConfig;
use crate::error::{JointError, JointResult};
use crate::estimator::OrientationEstimator;
use crate::flexion::FlexionCalculator;
use crate::lifecycle::{LifecycleGate, LifecycleState};
use crate::types::{ActuatorCommand, GaitLabel, Segment};

/// Cooperative stop signal for the control loop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        // register before checking so a concurrent cancel is not missed
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Run sensor attach/detach work that may block for a while
///
/// On a multi-threaded runtime the worker hands its other tasks off first;
/// elsewhere the call simply runs inline.
fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Shank history not yet full; nothing computed or sent
    WarmingUp,
    Dispatched {
        label: GaitLabel,
        flexion: f32,
        command: ActuatorCommand,
    },
}

pub struct JointController {
    config: JointConfig,
    gate: Arc<LifecycleGate>,
    estimator: Arc<OrientationEstimator>,
    calibration: CalibrationUnit,
    calculator: FlexionCalculator,
    mapper: CommandMapper,
    thigh: Box<dyn SensorSource>,
    shank: Box<dyn SensorSource>,
    classifier: Box<dyn GaitClassifier>,
    actuator: Box<dyn ActuatorDriver>,
    ticks: u64,
    released: bool,
}

impl JointController {
    pub fn new(
        config: JointConfig,
        thigh: Box<dyn SensorSource>,
        shank: Box<dyn SensorSource>,
        classifier: Box<dyn GaitClassifier>,
        actuator: Box<dyn ActuatorDriver>,
    ) -> JointResult<Self> {
        config.validate()?;
        if thigh.segment() != Segment::Thigh || shank.segment() != Segment::Shank {
            return Err(JointError::Config(format!(
                "sensor sources wired to {} and {}, expected thigh and shank",
                thigh.segment(),
                shank.segment()
            )));
        }

        let gate = Arc::new(LifecycleGate::new());
        let strategy = config.strategy;
        let estimator = Arc::new(OrientationEstimator::new(
            strategy,
            config.history_capacity,
            Arc::clone(&gate),
        ));

        Ok(Self {
            calibration: CalibrationUnit::new(strategy, Arc::clone(&gate)),
            calculator: FlexionCalculator::new(strategy, Arc::clone(&gate), config.debug),
            mapper: config.command_mapper(),
            config,
            gate,
            estimator,
            thigh,
            shank,
            classifier,
            actuator,
            ticks: 0,
            released: false,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.gate.current()
    }

    pub fn estimator(&self) -> &Arc<OrientationEstimator> {
        &self.estimator
    }

    pub fn calibration_offset(&self) -> Option<f32> {
        self.calibration.offset()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Attach both sensors, calibrate if the strategy needs it, and begin operating
    ///
    /// The joint is actuated before the sensors are opened so the first
    /// readings are accepted. Any failure leaves the joint terminated with
    /// both sensors closed.
    pub async fn start(&mut self) -> JointResult<()> {
        self.gate.transition(LifecycleState::Actuating)?;
        info!("Joint actuated ({} strategy)", self.config.strategy.name());

        if let Err(e) = run_blocking(|| self.attach_sensors()) {
            self.abort_startup();
            return Err(e);
        }

        if self.config.strategy.requires_calibration() {
            info!(
                "Waiting {:.1}s before calibration. Keep the knee fully extended.",
                self.config.settling_delay_secs
            );
            tokio::time::sleep(self.config.settling_delay()).await;

            if let Err(e) = self.calibrate() {
                error!("Calibration failed: {}", e);
                self.abort_startup();
                return Err(e);
            }
        }

        if let Err(e) = self.gate.transition(LifecycleState::Operating) {
            error!("Joint could not enter operation: {}", e);
            self.abort_startup();
            return Err(e);
        }
        info!("Joint operating");
        Ok(())
    }

    fn attach_sensors(&mut self) -> JointResult<()> {
        let timeout = self.config.attach_timeout();
        let thigh_handler = SegmentHandler::new(Segment::Thigh, Arc::clone(&self.estimator), Arc::clone(&self.gate));
        let shank_handler = SegmentHandler::new(Segment::Shank, Arc::clone(&self.estimator), Arc::clone(&self.gate));

        self.thigh.open(timeout, thigh_handler)?;
        self.shank.open(timeout, shank_handler)?;
        info!("Sensors connected");
        Ok(())
    }

    fn abort_startup(&mut self) {
        run_blocking(|| {
            self.thigh.close();
            self.shank.close();
        });
        self.released = true;
        if self.gate.current().is_active() {
            let _ = self.gate.transition(LifecycleState::Terminated);
        }
        warn!("Startup aborted; joint terminated");
    }

    /// Capture the reference pose from the current segment orientations
    ///
    /// `start` calls this once; calling it again re-calibrates.
    pub fn calibrate(&self) -> JointResult<Option<f32>> {
        let thigh = self.estimator.segment_state(Segment::Thigh);
        let shank = self.estimator.segment_state(Segment::Shank);
        self.calibration.calibrate(thigh, shank)
    }

    /// One control cycle
    ///
    /// A decided command is always dispatched before this returns.
    pub fn tick(&mut self) -> JointResult<TickOutcome> {
        self.gate.require_active("tick")?;

        if !self.estimator.is_warmed_up(Segment::Shank) {
            debug!("Shank history warming up; tick skipped");
            return Ok(TickOutcome::WarmingUp);
        }

        let window = self.estimator.feature_window(Segment::Shank);
        let label = self.classifier.predict(&window);

        let thigh = self.estimator.segment_state(Segment::Thigh);
        let shank = self.estimator.segment_state(Segment::Shank);
        let flexion = self
            .calculator
            .compute(thigh, shank, self.calibration.offset())
            .map_err(|e| {
                warn!("Tick skipped: {}", e);
                e
            })?;

        let command = self.mapper.command(flexion, &label);
        match command {
            ActuatorCommand::Stop => self.actuator.send_stop(),
            ActuatorCommand::Drive(value) => self.actuator.send(value),
        }
        self.ticks += 1;

        if self.config.debug {
            info!("Prediction: {}", label);
            info!("Flexion: {:.2}", flexion);
            info!("Modulation: {:?}", command);
        }

        Ok(TickOutcome::Dispatched {
            label,
            flexion,
            command,
        })
    }

    /// Close both sensors, park the actuator at neutral and terminate
    ///
    /// After a sensor fault the joint is already terminated; the first stop
    /// still releases everything and reports the fault.
    pub fn stop(&mut self) -> JointResult<()> {
        if let Some(fault) = self.release_after_fault() {
            return Err(fault);
        }
        let state = self.gate.current();
        if !state.is_active() {
            error!("Attempted to stop joint while not actuated ({:?})", state);
            return Err(JointError::NotActuated {
                operation: "stop",
                state,
            });
        }
        self.release();
        self.gate.transition(LifecycleState::Terminated)?;
        info!("Joint terminated after {} ticks", self.ticks);
        Ok(())
    }

    fn release(&mut self) {
        run_blocking(|| {
            self.thigh.close();
            self.shank.close();
        });
        info!("Sensors disconnected");
        self.actuator.send(self.mapper.neutral());
        self.released = true;
    }

    /// Release once if a sensor fault has terminated the joint
    fn release_after_fault(&mut self) -> Option<JointError> {
        let (segment, reason) = self.gate.fault()?;
        if self.released {
            return None;
        }
        error!("Releasing joint after {} sensor fault", segment);
        self.release();
        Some(JointError::SensorClosed { segment, reason })
    }

    /// Tick every `period` until `cancel` fires or a sensor fails
    ///
    /// Per-tick errors are logged and the loop carries on. A sensor fault
    /// ends the loop with the actuator parked at neutral.
    pub async fn run(&mut self, period: Duration, cancel: &CancellationToken) -> JointResult<()> {
        if let Some(fault) = self.release_after_fault() {
            return Err(fault);
        }
        self.gate.require_active("run")?;

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Some(fault) = self.release_after_fault() {
                error!("Control loop halted: {}", fault);
                return Err(fault);
            }

            if let Err(e) = self.tick() {
                debug!("Tick error contained: {}", e);
            }
        }

        // a fault racing the cancel still gets a full release
        if let Some(fault) = self.release_after_fault() {
            return Err(fault);
        }
        info!("Execution halted by user");
        self.stop()
    }
}
