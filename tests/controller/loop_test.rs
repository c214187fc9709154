//! The tokio control loop: periodic ticks, cancellation and sensor faults

use crossbeam_channel::bounded;
use std::time::Duration;

use knee_joint::sensors::ChannelSensor;
use knee_joint::{CancellationToken, GaitLabel, JointController, JointError, LifecycleState, Segment};

use crate::test_utils::{straight_leg_rig, test_config, tilted, ActuatorCall, RecordingActuator, ScriptedClassifier};

#[tokio::test(start_paused = true)]
async fn test_run_ticks_until_cancelled() {
    let mut rig = straight_leg_rig();
    rig.controller.start().await.expect("joint starts");
    for _ in 0..2 {
        rig.shank.push(tilted(90.0, [0.0, 0.0, 1.0]));
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let (outcome, _) = tokio::join!(rig.controller.run(Duration::from_millis(10), &cancel), async move {
        tokio::time::sleep(Duration::from_millis(55)).await;
        trigger.cancel();
    });

    outcome.expect("loop exits cleanly");
    assert_eq!(rig.controller.state(), LifecycleState::Terminated);
    assert!(rig.controller.ticks() >= 3, "only {} ticks ran", rig.controller.ticks());

    let calls = rig.actuator.calls();
    let (last, driven) = calls.split_last().expect("actuator was driven");
    assert_eq!(*last, ActuatorCall::Send(31));
    assert!(driven.iter().all(|call| *call == ActuatorCall::Send(143)));
    assert_eq!(driven.len() as u64, rig.controller.ticks());
}

#[tokio::test(start_paused = true)]
async fn test_run_contains_tick_errors() {
    let mut rig = straight_leg_rig();
    rig.controller.start().await.expect("joint starts");

    // shank window never fills; every tick is a warm-up
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let (outcome, _) = tokio::join!(rig.controller.run(Duration::from_millis(10), &cancel), async move {
        tokio::time::sleep(Duration::from_millis(35)).await;
        trigger.cancel();
    });

    outcome.expect("loop exits cleanly");
    assert_eq!(rig.controller.ticks(), 0);
    assert_eq!(rig.actuator.calls(), vec![ActuatorCall::Send(31)]);
}

#[tokio::test]
async fn test_run_requires_started_joint() {
    let mut rig = straight_leg_rig();
    let cancel = CancellationToken::new();

    let result = rig.controller.run(Duration::from_millis(10), &cancel).await;
    assert!(matches!(result, Err(JointError::NotActuated { operation: "run", .. })));
    assert!(rig.actuator.calls().is_empty());
}

#[tokio::test]
async fn test_already_cancelled_token_stops_immediately() {
    let mut rig = straight_leg_rig();
    rig.controller.start().await.expect("joint starts");

    let cancel = CancellationToken::new();
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), rig.controller.run(Duration::from_secs(60), &cancel))
        .await
        .expect("loop observes the cancelled token")
        .expect("loop exits cleanly");

    assert_eq!(rig.controller.state(), LifecycleState::Terminated);
    assert_eq!(rig.controller.ticks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fault_and_cancel_in_one_period_still_release() {
    let mut rig = straight_leg_rig();
    rig.controller.start().await.expect("joint starts");
    for _ in 0..2 {
        rig.shank.push(tilted(90.0, [0.0, 0.0, 1.0]));
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let thigh = rig.thigh.clone();
    let (outcome, _) = tokio::join!(rig.controller.run(Duration::from_secs(1), &cancel), async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        thigh.disconnect("cable pulled");
        trigger.cancel();
    });

    assert!(matches!(
        outcome,
        Err(JointError::SensorClosed {
            segment: Segment::Thigh,
            ..
        })
    ));
    assert_eq!(rig.controller.state(), LifecycleState::Terminated);
    assert_eq!(
        rig.actuator.calls(),
        vec![ActuatorCall::Send(143), ActuatorCall::Send(31)]
    );
    assert_eq!(rig.thigh.close_count(), 1);
    assert_eq!(rig.shank.close_count(), 1);

    // already released; nothing further reaches the actuator
    assert!(matches!(rig.controller.stop(), Err(JointError::NotActuated { .. })));
    assert_eq!(rig.actuator.calls().len(), 2);
}

#[tokio::test]
async fn test_stop_after_fault_releases_once() {
    let mut rig = straight_leg_rig();
    rig.controller.start().await.expect("joint starts");
    for _ in 0..2 {
        rig.shank.push(tilted(90.0, [0.0, 0.0, 1.0]));
    }
    rig.controller.tick().expect("tick succeeds");

    rig.shank.disconnect("stream ended");

    assert!(matches!(
        rig.controller.stop(),
        Err(JointError::SensorClosed {
            segment: Segment::Shank,
            ..
        })
    ));
    assert_eq!(rig.actuator.calls().last(), Some(&ActuatorCall::Send(31)));
    assert_eq!(rig.thigh.close_count(), 1);
    assert_eq!(rig.shank.close_count(), 1);

    let cancel = CancellationToken::new();
    let rerun = rig.controller.run(Duration::from_millis(10), &cancel).await;
    assert!(matches!(rerun, Err(JointError::NotActuated { .. })));
    assert_eq!(rig.actuator.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sensor_stream_loss_ends_run() {
    let (thigh_tx, thigh_rx) = bounded(16);
    let (shank_tx, shank_rx) = bounded(16);
    thigh_tx.send(tilted(0.0, [0.0; 3])).expect("queue thigh reading");
    shank_tx.send(tilted(0.0, [0.0; 3])).expect("queue shank reading");

    let actuator = RecordingActuator::default();
    let mut controller = JointController::new(
        test_config(),
        Box::new(ChannelSensor::new(Segment::Thigh, thigh_rx)),
        Box::new(ChannelSensor::new(Segment::Shank, shank_rx)),
        Box::new(ScriptedClassifier::new(GaitLabel::Forward)),
        Box::new(actuator.clone()),
    )
    .expect("valid controller wiring");
    controller.start().await.expect("joint starts");

    let cancel = CancellationToken::new();
    let (outcome, _) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(5), controller.run(Duration::from_millis(10), &cancel)),
        async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(thigh_tx);
        }
    );

    let result = outcome.expect("loop ends on its own");
    assert!(matches!(
        result,
        Err(JointError::SensorClosed {
            segment: Segment::Thigh,
            ..
        })
    ));
    assert_eq!(controller.state(), LifecycleState::Terminated);
    assert_eq!(actuator.calls().last(), Some(&ActuatorCall::Send(31)));
    drop(shank_tx);
}
