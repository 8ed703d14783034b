use log::{debug, info, warn};
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};

use crate::arm_hal::SharedArm;
use crate::launcher::PickLauncher;
use crate::vision::{PickRequest, VisionEvent};

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct EventLoopStats {
    pub alignments_forwarded: u32,
    pub triggers_accepted: u32,
    pub triggers_dropped: u32,
    pub triggers_rejected: u32,
}

/// Dispatches vision events until the channel closes or `shutdown` fires.  Alignment updates go
/// straight to the arm, also while a pick is running.  Triggers go through the launcher.
pub async fn run_event_loop(
    mut events: Receiver<VisionEvent>,
    mut shutdown: UnboundedReceiver<()>,
    arm: SharedArm,
    launcher: PickLauncher,
) -> EventLoopStats {
    let mut stats = EventLoopStats::default();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => handle_event(event, &arm, &launcher, &mut stats).await,
                    None => break,
                }
            },
            _ = shutdown.recv() => {
                break;
            },
        }
    }
    info!("Event loop done: {stats:?}");
    stats
}

async fn handle_event(event: VisionEvent, arm: &SharedArm, launcher: &PickLauncher, stats: &mut EventLoopStats) {
    match event {
        VisionEvent::Alignment(alignment) => {
            match arm.lock().await.set_alignment_point(alignment.x, alignment.z) {
                Ok(()) => stats.alignments_forwarded += 1,
                Err(e) => warn!("Alignment update failed: {e:#}"),
            }
        }
        VisionEvent::PickTrigger(detection) => {
            let request = PickRequest::from(&detection);
            if !request.is_finite() {
                warn!("Ignoring trigger with non-finite pose: {detection:?}");
                stats.triggers_rejected += 1;
            } else if launcher.launch(request) {
                stats.triggers_accepted += 1;
            } else {
                debug!("Trigger dropped: {detection:?}");
                stats.triggers_dropped += 1;
            }
        }
    }
}
