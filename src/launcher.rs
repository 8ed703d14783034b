use std::sync::Arc;

use futures_signals::signal::Mutable;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Sender};
use tokio::task::JoinHandle;

use crate::pick_sequence::{PickSequence, SequenceReport};
use crate::sequence_coordinator::SequenceCoordinator;
use crate::vision::PickRequest;

/// Front door for pick requests.  At most one request is in flight; anything arriving while
/// one runs is dropped on the spot rather than queued.
pub struct PickLauncher {
    coordinator: Arc<SequenceCoordinator>,
    slot: Sender<PickRequest>,
}

impl PickLauncher {
    /// Returns immediately.  `true` means the request was handed to the worker.
    pub fn launch(&self, request: PickRequest) -> bool {
        if !self.coordinator.try_begin() {
            info!("Pick sequence already running, ignoring trigger");
            return false;
        }
        match self.slot.try_send(request) {
            Ok(()) => {
                debug!("Pick request accepted: {request:?}");
                true
            }
            Err(TrySendError::Full(request)) | Err(TrySendError::Closed(request)) => {
                warn!("Pick worker unavailable, dropping {request:?}");
                self.coordinator.end();
                false
            }
        }
    }

    pub fn coordinator(&self) -> &Arc<SequenceCoordinator> {
        &self.coordinator
    }
}

/// Starts the single pick worker.  It runs until every launcher handle is gone and then hands
/// the sequence back so the caller can shut the hardware down.
pub fn spawn_pick_worker(
    mut sequence: PickSequence,
    coordinator: Arc<SequenceCoordinator>,
    last_report: Mutable<Option<SequenceReport>>,
) -> (PickLauncher, JoinHandle<PickSequence>) {
    let (slot, mut requests) = mpsc::channel::<PickRequest>(1);
    let worker_coordinator = coordinator.clone();
    let handle = tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let _idle = IdleOnDrop(&worker_coordinator);
            let report = sequence.run(&request).await;
            info!("Pick sequence finished: {report:?}");
            last_report.set(Some(report));
        }
        debug!("Pick worker exiting");
        sequence
    });
    (PickLauncher { coordinator, slot }, handle)
}

/// Back to `Idle` however the sequence ends, unwinding included.
struct IdleOnDrop<'a>(&'a SequenceCoordinator);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.end();
    }
}
