//! What the vision pipeline hands to the picker.  Producers run in their own callbacks, so
//! sending never blocks: when the event loop falls behind, new events are dropped.

use derive_new::new;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::arm_hal::TargetPose;

/// A detected fruit.  Coordinates in metres in the arm base frame, `distance` as estimated by
/// the camera, `angle` in degrees.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize, new)]
pub struct DetectionEvent {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance: f64,
    pub angle: f64,
}

/// Live tracking update, steered into the arm while it follows a target.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize, new)]
pub struct AlignmentEvent {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance: f64,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct PickRequest {
    pub target: TargetPose,
    pub angle: f64,
}

impl PickRequest {
    /// Only what the arm is actually sent has to be finite.
    pub fn is_finite(&self) -> bool {
        self.target.is_finite() && self.angle.is_finite()
    }
}

impl From<&DetectionEvent> for PickRequest {
    fn from(event: &DetectionEvent) -> Self {
        Self {
            target: TargetPose::new(event.x, event.y, event.z),
            angle: event.angle,
        }
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum VisionEvent {
    Alignment(AlignmentEvent),
    PickTrigger(DetectionEvent),
}

#[derive(Clone)]
pub struct VisionEventSender {
    tx: Sender<VisionEvent>,
}

impl VisionEventSender {
    /// Returns whether the event was queued.
    pub fn send_alignment(&self, event: AlignmentEvent) -> bool {
        self.send(VisionEvent::Alignment(event))
    }

    /// Returns whether the event was queued.  Being queued says nothing about whether a pick
    /// will start.
    pub fn send_pick_trigger(&self, event: DetectionEvent) -> bool {
        self.send(VisionEvent::PickTrigger(event))
    }

    fn send(&self, event: VisionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!("Vision channel full, dropping {event:?}");
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!("Vision channel closed, dropping {event:?}");
                false
            }
        }
    }
}

pub fn vision_channel(capacity: usize) -> (VisionEventSender, Receiver<VisionEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (VisionEventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_channel_drops_newest() {
        let (sender, mut rx) = vision_channel(1);
        assert!(sender.send_alignment(AlignmentEvent::new(0.1, 0.0, 0.3, 0.3)));
        assert!(!sender.send_pick_trigger(DetectionEvent::new(0.1, 0.2, 0.3, 0.3, 15.0)));
        assert_eq!(rx.try_recv().unwrap(), VisionEvent::Alignment(AlignmentEvent::new(0.1, 0.0, 0.3, 0.3)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_drops() {
        let (sender, rx) = vision_channel(4);
        drop(rx);
        assert!(!sender.send_alignment(AlignmentEvent::new(0.0, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_request_from_detection() {
        let request = PickRequest::from(&DetectionEvent::new(0.1, -0.2, 0.45, 0.5, 30.0));
        assert_eq!(request.target, TargetPose::new(0.1, -0.2, 0.45));
        assert_eq!(request.angle, 30.0);
    }

    #[test]
    fn test_non_finite_request() {
        let finite = |event: DetectionEvent| PickRequest::from(&event).is_finite();
        assert!(finite(DetectionEvent::new(0.1, 0.2, 0.3, 0.3, 0.0)));
        assert!(finite(DetectionEvent::new(0.1, 0.2, 0.3, f64::NAN, 0.0)));
        assert!(!finite(DetectionEvent::new(f64::NAN, 0.2, 0.3, 0.3, 0.0)));
        assert!(!finite(DetectionEvent::new(0.1, 0.2, f64::NEG_INFINITY, 0.3, 0.0)));
        assert!(!finite(DetectionEvent::new(0.1, 0.2, 0.3, 0.3, f64::INFINITY)));
    }
}
