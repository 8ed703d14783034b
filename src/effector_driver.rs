use anyhow::anyhow;
use conv::{ConvUtil, RoundToZero};
use log::{error, info};
use tokio::time::{sleep, Duration};

use crate::actuator_hal::{raw_to_angle_deg, ActuatorHal, ControlMode, Direction, POSITION_RAW_MAX, POSITION_SPAN_DEG};

const STOP_SETTLE: Duration = Duration::from_millis(300);

/// Gripper motor driver.  Tracks the operating mode it last switched to so repeated requests
/// for the same mode don't cycle torque.
pub struct EffectorDriver {
    hal: Box<dyn ActuatorHal + Send>,
    mode: Option<ControlMode>,
}

impl EffectorDriver {
    pub fn new(hal: Box<dyn ActuatorHal + Send>) -> Self {
        Self { hal, mode: None }
    }

    pub fn mode(&self) -> Option<ControlMode> {
        self.mode
    }

    /// Spins for `duration` and then always stops, whichever way this returns.  With
    /// `restore_mode` the motor is also put back into position holding on the way out.
    pub async fn rotate_for(
        &mut self,
        duration: Duration,
        direction: Direction,
        speed: u32,
        restore_mode: bool,
    ) -> anyhow::Result<()> {
        let mut rotation = RotationGuard::new(self, restore_mode);
        rotation.driver.set_mode(ControlMode::Velocity)?;
        info!("Rotate {direction:?} for {:.2}s @ {speed}", duration.as_secs_f64());
        rotation.driver.hal.set_goal_velocity(direction.signed(speed))?;
        sleep(duration).await;
        rotation.finish()
    }

    pub fn start_rotation(&mut self, direction: Direction, speed: u32) -> anyhow::Result<()> {
        self.set_mode(ControlMode::Velocity)?;
        info!("Continuous {direction:?} rotation @ {speed}");
        self.hal.set_goal_velocity(direction.signed(speed))
    }

    pub async fn stop_rotation(&mut self) -> anyhow::Result<()> {
        self.stop()?;
        sleep(STOP_SETTLE).await;
        self.set_mode(ControlMode::Position)
    }

    pub fn stop(&mut self) -> anyhow::Result<()> {
        self.hal.set_goal_velocity(0)
    }

    pub fn reset_to_angle(&mut self, angle_deg: f64) -> anyhow::Result<()> {
        let raw = (angle_deg * f64::from(POSITION_RAW_MAX) / POSITION_SPAN_DEG)
            .approx_as_by::<i32, RoundToZero>()
            .map_err(|e| anyhow!("angle {angle_deg} is not a motor position: {e:?}"))?;
        if !(0..=POSITION_RAW_MAX).contains(&raw) {
            return Err(anyhow!("angle {angle_deg} outside 0..={POSITION_SPAN_DEG}"));
        }
        self.set_mode(ControlMode::Position)?;
        info!("Resetting to {angle_deg:.1}° (raw {raw})");
        self.hal.set_goal_position(raw)
    }

    pub fn present_angle(&self) -> anyhow::Result<(i32, f64)> {
        let raw = self.hal.present_position()?;
        Ok((raw, raw_to_angle_deg(raw)))
    }

    /// Stop, then drop torque even if the stop failed.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        let stopped = self.stop();
        self.mode = None;
        let torque = self.hal.torque_off();
        info!("Effector torque off");
        stopped.and(torque)
    }

    fn set_mode(&mut self, mode: ControlMode) -> anyhow::Result<()> {
        if self.mode == Some(mode) {
            return Ok(());
        }
        self.mode = None;
        self.hal.set_operating_mode(mode)?;
        self.mode = Some(mode);
        Ok(())
    }

    fn halt(&mut self, restore_mode: bool) -> anyhow::Result<()> {
        let stopped = self.stop();
        let restored = if restore_mode {
            self.set_mode(ControlMode::Position)
        } else {
            Ok(())
        };
        info!("Rotation stopped");
        stopped.and(restored)
    }
}

/// Held for the duration of one rotation.  Dropping it without `finish` (an error, or the
/// future being cancelled mid-hold) still commands zero velocity.
struct RotationGuard<'a> {
    driver: &'a mut EffectorDriver,
    restore_mode: bool,
    armed: bool,
}

impl<'a> RotationGuard<'a> {
    fn new(driver: &'a mut EffectorDriver, restore_mode: bool) -> Self {
        Self { driver, restore_mode, armed: true }
    }

    fn finish(mut self) -> anyhow::Result<()> {
        self.armed = false;
        self.driver.halt(self.restore_mode)
    }
}

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.driver.halt(self.restore_mode) {
                error!("Failed to stop effector after aborted rotation: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::{HwCommand, SimBench};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rotate_for_stops_and_restores() {
        let bench = SimBench::default();
        let mut driver = EffectorDriver::new(bench.actuator());
        driver.rotate_for(Duration::from_secs(2), Direction::Reverse, 100, true).await.unwrap();
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::GoalVelocity(-100),
            HwCommand::GoalVelocity(0),
            HwCommand::SetMode(ControlMode::Position),
        ]);
        assert_eq!(driver.mode(), Some(ControlMode::Position));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_velocity_command_still_stops() {
        let bench = SimBench::default();
        bench.world().faults.fail_goal_velocity = Some(100);
        let mut driver = EffectorDriver::new(bench.actuator());
        assert!(driver.rotate_for(Duration::from_secs(2), Direction::Forward, 100, false).await.is_err());
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::GoalVelocity(0),
        ]);
        assert_eq!(driver.mode(), Some(ControlMode::Velocity));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_rotation_still_stops() {
        let bench = SimBench::default();
        let mut driver = EffectorDriver::new(bench.actuator());
        let rotation = driver.rotate_for(Duration::from_secs(10), Direction::Forward, 100, true);
        assert!(tokio::time::timeout(Duration::from_secs(1), rotation).await.is_err());
        assert_eq!(bench.commands().last(), Some(&HwCommand::SetMode(ControlMode::Position)));
        assert!(bench.commands().contains(&HwCommand::GoalVelocity(0)));
        assert_eq!(bench.world().velocity, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rotation_returns_to_position_mode() {
        let bench = SimBench::default();
        let mut driver = EffectorDriver::new(bench.actuator());
        driver.start_rotation(Direction::Forward, 100).unwrap();
        driver.start_rotation(Direction::Reverse, 100).unwrap();
        driver.stop_rotation().await.unwrap();
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::GoalVelocity(100),
            HwCommand::GoalVelocity(-100),
            HwCommand::GoalVelocity(0),
            HwCommand::SetMode(ControlMode::Position),
        ]);
    }

    #[test]
    fn test_reset_to_angle() {
        let bench = SimBench::default();
        let mut driver = EffectorDriver::new(bench.actuator());
        driver.reset_to_angle(100.0).unwrap();
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Position),
            HwCommand::GoalPosition(511),
        ]);
        let (raw, angle) = driver.present_angle().unwrap();
        assert_eq!(raw, 511);
        assert!((angle - 99.9).abs() < 0.1);
        assert!(driver.reset_to_angle(250.0).is_err());
        assert!(driver.reset_to_angle(f64::NAN).is_err());
    }

    #[test]
    fn test_shutdown_drops_torque_even_if_stop_fails() {
        let bench = SimBench::default();
        bench.world().faults.fail_goal_velocity = Some(0);
        let mut driver = EffectorDriver::new(bench.actuator());
        assert!(driver.shutdown().is_err());
        assert_eq!(bench.commands(), vec![HwCommand::TorqueOff]);
    }
}
