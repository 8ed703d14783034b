use log::{debug, info};
use tokio::time::{sleep, timeout, Duration};

use crate::arm_hal::{Frame, SharedArm, TargetPose};
use crate::config::MotionConfig;
use crate::error::{PickError, PickResult};

/// Blocking-style motion helpers over the shared arm: issue a command, then poll until the
/// controller reports the move finished or the configured bound runs out.
#[derive(Clone)]
pub struct ArmMotion {
    arm: SharedArm,
    timeout: Duration,
    poll_interval: Duration,
}

impl ArmMotion {
    pub fn new(arm: SharedArm, config: &MotionConfig) -> Self {
        Self {
            arm,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn arm(&self) -> &SharedArm {
        &self.arm
    }

    pub async fn approach(&self, target: TargetPose, angle_deg: f64) -> PickResult<()> {
        info!("Approaching target at ({:.3}, {:.3}, {:.3}) m, angle {angle_deg:.1}°", target.x, target.y, target.z);
        self.arm.lock().await.approach_target(target, angle_deg).map_err(PickError::Motion)?;
        self.wait_until_move_finished().await
    }

    /// Relative move along the tool-frame depth axis only.
    pub async fn move_tool_depth(&self, depth_m: f64) -> PickResult<()> {
        {
            let mut arm = self.arm.lock().await;
            arm.select_frame(Frame::Tool).map_err(PickError::Motion)?;
            arm.move_relative([0.0, 0.0, depth_m, 0.0, 0.0, 0.0]).map_err(PickError::Motion)?;
        }
        self.wait_until_move_finished().await
    }

    pub async fn go_home(&self) -> PickResult<()> {
        self.arm.lock().await.go_home().map_err(PickError::Motion)?;
        self.wait_until_move_finished().await
    }

    pub async fn wait_until_move_finished(&self) -> PickResult<()> {
        let poll = async {
            loop {
                if self.arm.lock().await.is_move_finished().map_err(PickError::Motion)? {
                    return Ok::<(), PickError>(());
                }
                sleep(self.poll_interval).await;
            }
        };
        match timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Gave up waiting for the arm after {:?}", self.timeout);
                Err(PickError::MotionTimeout(self.timeout))
            }
        }
    }
}
