//! Joint lifecycle state machine
//!
//! The gate is shared by the controller, the estimator and every sensor
//! handler so that ingestion and computation observe the same state.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{JointError, JointResult};
use crate::types::Segment;

/// Lifecycle of one run of the joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Inactive,
    /// Sensors attached, waiting for or running calibration
    Actuating,
    Operating,
    Terminated,
}

impl LifecycleState {
    /// Sensor updates and flexion computation are only valid here
    pub fn is_active(self) -> bool {
        matches!(self, LifecycleState::Actuating | LifecycleState::Operating)
    }
}

/// Shared, validated lifecycle state
#[derive(Debug, Default)]
pub struct LifecycleGate {
    state: RwLock<LifecycleState>,
    fault: Mutex<Option<(Segment, String)>>,
}

impl LifecycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Fails with `NotActuated` unless the joint is actuating or operating
    pub fn require_active(&self, operation: &'static str) -> JointResult<()> {
        let state = self.current();
        if state.is_active() {
            Ok(())
        } else {
            error!("{} attempted while joint is not actuated ({:?})", operation, state);
            Err(JointError::NotActuated { operation, state })
        }
    }

    /// Move to `to` if the transition is allowed
    pub fn transition(&self, to: LifecycleState) -> JointResult<()> {
        let mut state = self.state.write();
        let from = *state;
        if !is_valid_transition(from, to) {
            return Err(JointError::InvalidTransition { from, to });
        }
        *state = to;
        debug!("Lifecycle transition: {:?} -> {:?}", from, to);
        Ok(())
    }

    /// Record a fatal sensor fault and terminate an active joint
    pub fn fail(&self, segment: Segment, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Fatal {} sensor fault: {}", segment, reason);
        let mut state = self.state.write();
        if state.is_active() {
            *state = LifecycleState::Terminated;
        }
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some((segment, reason));
        }
    }

    /// First fatal fault recorded for this run, if any
    pub fn fault(&self) -> Option<(Segment, String)> {
        self.fault.lock().clone()
    }
}

fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
    use LifecycleState::*;
    match (from, to) {
        (Inactive, Actuating) => true,
        (Actuating, Operating) => true,
        (Actuating, Terminated) => true,
        (Operating, Terminated) => true,
        _ => false,
    }
}
