//! Dry-run entry point: drives the joint controller from the gait simulator
//! with the threshold classifier and a logging actuator.
//!
//! Usage: `knee-joint [config.toml]`

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use knee_joint::actuator::LoggingActuator;
use knee_joint::classifier::MotionThresholdClassifier;
use knee_joint::sensors::{ChannelSensor, GaitSimulator};
use knee_joint::{logging, CancellationToken, JointConfig, JointController, Segment, SpatialReading};

/// Simulated sensor update rate
const SAMPLE_PERIOD: Duration = Duration::from_millis(20);

fn spawn_simulator(
    sim: GaitSimulator,
    thigh: Sender<SpatialReading>,
    shank: Sender<SpatialReading>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("gait-simulator".to_string())
        .spawn(move || {
            let start = Instant::now();
            while running.load(Ordering::SeqCst) {
                let t = start.elapsed().as_secs_f32();
                // a full channel means nobody is draining it; drop the sample
                let sent = [
                    thigh.try_send(sim.reading(Segment::Thigh, t)),
                    shank.try_send(sim.reading(Segment::Shank, t)),
                ];
                if sent.iter().any(|r| matches!(r, Err(TrySendError::Disconnected(_)))) {
                    break;
                }
                std::thread::sleep(SAMPLE_PERIOD);
            }
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => JointConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        None => JointConfig::default(),
    };
    logging::init(config.debug);
    info!("Knee joint dry run: {:?}", config);

    let (thigh_tx, thigh_rx) = bounded(64);
    let (shank_tx, shank_rx) = bounded(64);
    let running = Arc::new(AtomicBool::new(true));
    let simulator = spawn_simulator(GaitSimulator::default(), thigh_tx, shank_tx, Arc::clone(&running))
        .context("Failed to start gait simulator")?;

    let period = config.tick_period();
    let mut controller = JointController::new(
        config,
        Box::new(ChannelSensor::new(Segment::Thigh, thigh_rx)),
        Box::new(ChannelSensor::new(Segment::Shank, shank_rx)),
        Box::new(MotionThresholdClassifier::default()),
        Box::new(LoggingActuator::default()),
    )?;

    controller.start().await.context("Joint failed to start")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    warn!("Press CTRL + C to halt execution.");
    let outcome = controller.run(period, &cancel).await;

    running.store(false, Ordering::SeqCst);
    if simulator.join().is_err() {
        warn!("Gait simulator thread panicked");
    }
    outcome.context("Control loop ended with an error")
}
