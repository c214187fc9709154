//! Sensor callbacks racing the control tick over shared estimator state

use approx::assert_relative_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use knee_joint::{
    Channel, FlexionCalculator, FlexionStrategy, LifecycleGate, LifecycleState, OrientationEstimator,
    OrientationSample, Segment, SegmentState,
};

fn tilted(degrees: f32) -> OrientationSample {
    let theta = degrees.to_radians();
    OrientationSample::Vector([theta.sin(), 0.0, theta.cos()])
}

fn setup(strategy: FlexionStrategy) -> (Arc<LifecycleGate>, Arc<OrientationEstimator>) {
    let gate = Arc::new(LifecycleGate::new());
    gate.transition(LifecycleState::Actuating).expect("gate actuates");
    let estimator = Arc::new(OrientationEstimator::new(strategy, 3, Arc::clone(&gate)));
    (gate, estimator)
}

#[test]
fn test_concurrent_updates_never_tear_segment_state() {
    let (gate, estimator) = setup(FlexionStrategy::Vector);
    let calculator = FlexionCalculator::new(FlexionStrategy::Vector, gate, false);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..5000 {
                let degrees = if i % 2 == 0 { 30.0 } else { 60.0 };
                estimator
                    .update(Segment::Shank, Channel::Acceleration, tilted(degrees))
                    .expect("update accepted");
            }
            done.store(true, Ordering::SeqCst);
        });

        scope.spawn(|| {
            let mut reads = 0;
            while !done.load(Ordering::SeqCst) || reads < 100 {
                let thigh = estimator.segment_state(Segment::Thigh);
                let shank = estimator.segment_state(Segment::Shank);
                let flexion = calculator.compute(thigh, shank, Some(0.0)).expect("computes");
                let near = |target: f32| (flexion - target).abs() < 1e-3;
                assert!(
                    near(0.0) || near(30.0) || near(60.0),
                    "flexion {} is not one of the written poses",
                    flexion
                );
                reads += 1;
            }
        });
    });

    let SegmentState::Vector(last) = estimator.segment_state(Segment::Shank) else {
        panic!("vector mode produced a non-vector state");
    };
    assert_relative_eq!(last.x, 60.0f32.to_radians().sin(), epsilon = 1e-6);
}

#[test]
fn test_segments_update_independently_across_threads() {
    let (_gate, estimator) = setup(FlexionStrategy::Vector);

    std::thread::scope(|scope| {
        for segment in Segment::ALL {
            let estimator = &estimator;
            scope.spawn(move || {
                for _ in 0..1000 {
                    let sample = match segment {
                        Segment::Thigh => OrientationSample::Vector([0.0, 1.0, 0.0]),
                        Segment::Shank => OrientationSample::Vector([1.0, 0.0, 0.0]),
                    };
                    estimator.update(segment, Channel::Acceleration, sample).expect("update accepted");
                    estimator
                        .update(segment, Channel::AngularRate, OrientationSample::Vector([0.0, 0.0, 1.0]))
                        .expect("update accepted");
                }
            });
        }
    });

    assert_eq!(estimator.segment_state(Segment::Thigh), SegmentState::Vector(glam::Vec3::Y));
    assert_eq!(estimator.segment_state(Segment::Shank), SegmentState::Vector(glam::Vec3::X));
    for segment in Segment::ALL {
        assert!(estimator.is_warmed_up(segment));
        assert_eq!(estimator.history(segment, Channel::Acceleration).len(), 3);
    }
}

#[test]
fn test_terminated_gate_freezes_state() {
    let (gate, estimator) = setup(FlexionStrategy::Quaternion);
    estimator
        .update(Segment::Thigh, Channel::Orientation, OrientationSample::quaternion(0.0, 1.0, 0.0, 0.0))
        .expect("update accepted");

    gate.transition(LifecycleState::Terminated).expect("gate terminates");

    let rejected = estimator.update(
        Segment::Thigh,
        Channel::Orientation,
        OrientationSample::quaternion(1.0, 0.0, 0.0, 0.0),
    );
    assert!(rejected.is_err());
    assert_eq!(
        estimator.segment_state(Segment::Thigh),
        SegmentState::Quaternion((0.0, [1.0, 0.0, 0.0]))
    );
}
