use std::sync::Arc;

use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Capability interface to the arm's native motion client.  Lengths are in metres, rotations in
/// degrees.  Commands return as soon as the controller accepted them; completion is observed by
/// polling [`ArmHal::is_move_finished`].
pub trait ArmHal {
    fn select_frame(&mut self, frame: Frame) -> anyhow::Result<()>;
    fn move_relative(&mut self, delta: [f64; 6]) -> anyhow::Result<()>;
    fn approach_target(&mut self, target: TargetPose, angle_deg: f64) -> anyhow::Result<()>;
    fn is_move_finished(&self) -> anyhow::Result<bool>;
    fn go_home(&mut self) -> anyhow::Result<()>;
    fn set_alignment_point(&mut self, x: f64, depth: f64) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

/// The arm is shared between the event loop (alignment updates) and the pick worker (motion).
/// Hold the lock for single commands only, never across a wait.
pub type SharedArm = Arc<Mutex<Box<dyn ArmHal + Send>>>;

pub fn share_arm(arm: Box<dyn ArmHal + Send>) -> SharedArm {
    Arc::new(Mutex::new(arm))
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Frame {
    Base,
    Tool,
}

#[derive(Debug, PartialEq, Copy, Clone, Default, Serialize, Deserialize, new)]
pub struct TargetPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TargetPose {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
