use std::sync::Arc;

use anyhow::Context;
use futures_signals::signal::{Mutable, MutableSignal};
use log::info;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;

use crate::arm_hal::share_arm;
use crate::config::PickConfig;
use crate::event_loop::{run_event_loop, EventLoopStats};
use crate::harvester_hal_factory::HarvesterHal;
use crate::launcher::spawn_pick_worker;
use crate::pick_sequence::{PickSequence, SequenceReport};
use crate::sequence_coordinator::{SequenceCoordinator, SequenceState};
use crate::telemetry::TelemetrySink;
use crate::vision::{vision_channel, VisionEventSender};

/// The running picker: an event loop feeding one pick worker.
pub struct Harvester {
    coordinator: Arc<SequenceCoordinator>,
    last_report: Mutable<Option<SequenceReport>>,
    event_loop: JoinHandle<EventLoopStats>,
    worker: JoinHandle<PickSequence>,
    shutdown: UnboundedSender<()>,
}

impl Harvester {
    pub async fn start(
        hal: HarvesterHal,
        config: PickConfig,
        telemetry: Box<dyn TelemetrySink>,
    ) -> (Self, VisionEventSender) {
        let arm = share_arm(hal.arm);
        let capacity = config.vision.channel_capacity;
        let sequence = PickSequence::assemble(arm.clone(), hal.actuator, hal.sensor, telemetry, config).await;

        let coordinator = Arc::new(SequenceCoordinator::new());
        let last_report = Mutable::new(None);
        let (launcher, worker) = spawn_pick_worker(sequence, coordinator.clone(), last_report.clone());

        let (sender, events) = vision_channel(capacity);
        let (shutdown_tx, shutdown_rx) = unbounded_channel();
        let event_loop = tokio::spawn(run_event_loop(events, shutdown_rx, arm, launcher));
        info!("Harvester ready");

        let harvester = Self {
            coordinator,
            last_report,
            event_loop,
            worker,
            shutdown: shutdown_tx,
        };
        (harvester, sender)
    }

    pub fn state(&self) -> SequenceState {
        self.coordinator.state()
    }

    pub fn state_signal(&self) -> MutableSignal<SequenceState> {
        self.coordinator.signal()
    }

    pub fn last_report(&self) -> Option<SequenceReport> {
        self.last_report.get_cloned()
    }

    /// Stops taking events, lets an in-flight pick finish (homing included), then releases the
    /// gripper and disconnects the arm.
    pub async fn shutdown(self) -> anyhow::Result<EventLoopStats> {
        // The event loop may already be gone if every sender was dropped.
        let _ = self.shutdown.send(());
        let stats = self.event_loop.await.context("event loop task failed")?;
        let mut sequence = self.worker.await.context("pick worker task failed")?;
        sequence.shutdown().await?;
        info!("Harvester stopped");
        Ok(stats)
    }
}
