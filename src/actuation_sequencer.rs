use log::info;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use crate::actuator_hal::Direction;
use crate::config::GraspConfig;
use crate::effector_driver::EffectorDriver;
use crate::error::{PickError, PickResult};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum PhaseKind {
    Open,
    Close,
    ReopenAndRestore,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ActuationPhase {
    pub kind: PhaseKind,
    pub direction: Direction,
    pub duration: Duration,
    pub speed: u32,
    pub restore_holding_mode: bool,
}

/// Runs the scripted grasp: each phase spins the gripper for a fixed time and is always
/// followed by a zero-velocity command, even when the phase fails.
pub struct ActuationSequencer {
    driver: EffectorDriver,
    inter_phase_pause: Duration,
    final_settle: Duration,
}

impl ActuationSequencer {
    pub fn new(driver: EffectorDriver, config: &GraspConfig) -> Self {
        Self {
            driver,
            inter_phase_pause: config.inter_phase_pause(),
            final_settle: config.final_settle(),
        }
    }

    pub fn driver_mut(&mut self) -> &mut EffectorDriver {
        &mut self.driver
    }

    pub async fn run_grasp_cycle(&mut self, phases: &[ActuationPhase]) -> PickResult<()> {
        for (index, phase) in phases.iter().enumerate() {
            info!("Grasp phase {:?}", phase.kind);
            self.driver
                .rotate_for(phase.duration, phase.direction, phase.speed, phase.restore_holding_mode)
                .await
                .map_err(|cause| PickError::Actuation { phase: phase.kind, cause })?;
            let pause = if index + 1 == phases.len() {
                self.final_settle
            } else {
                self.inter_phase_pause
            };
            sleep(pause).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use crate::actuator_hal::ControlMode;
    use crate::sim::{HwCommand, SimBench};

    use super::*;

    fn sequencer(bench: &SimBench) -> ActuationSequencer {
        ActuationSequencer::new(EffectorDriver::new(bench.actuator()), &GraspConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_restores_only_at_the_end() {
        let bench = SimBench::default();
        let mut sequencer = sequencer(&bench);
        let start = Instant::now();
        sequencer.run_grasp_cycle(&GraspConfig::default().phases()).await.unwrap();
        let expected = Duration::from_millis(2000 + 1000 + 3500 + 1000 + 2000 + 1000);
        let elapsed = start.elapsed();
        assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(50), "took {elapsed:?}");
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::GoalVelocity(100),
            HwCommand::GoalVelocity(0),
            HwCommand::GoalVelocity(-100),
            HwCommand::GoalVelocity(0),
            HwCommand::GoalVelocity(100),
            HwCommand::GoalVelocity(0),
            HwCommand::SetMode(ControlMode::Position),
        ]);
        assert_eq!(sequencer.driver_mut().mode(), Some(ControlMode::Position));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_failure_is_stopped_then_reported() {
        let bench = SimBench::default();
        bench.world().faults.fail_goal_velocity = Some(-100);
        let mut sequencer = sequencer(&bench);
        let err = sequencer.run_grasp_cycle(&GraspConfig::default().phases()).await.unwrap_err();
        assert!(matches!(err, PickError::Actuation { phase: PhaseKind::Close, .. }));
        assert_eq!(bench.commands(), vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::GoalVelocity(100),
            HwCommand::GoalVelocity(0),
            HwCommand::GoalVelocity(0),
        ]);
        assert_eq!(bench.world().velocity, 0);
        assert_eq!(sequencer.driver_mut().mode(), Some(ControlMode::Velocity));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cycle_switches_back_to_velocity() {
        let bench = SimBench::default();
        let mut sequencer = sequencer(&bench);
        let phases = GraspConfig::default().phases();
        sequencer.run_grasp_cycle(&phases).await.unwrap();
        sequencer.run_grasp_cycle(&phases).await.unwrap();
        let mode_switches: Vec<_> = bench.commands().into_iter()
            .filter(|c| matches!(c, HwCommand::SetMode(_)))
            .collect();
        assert_eq!(mode_switches, vec![
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::SetMode(ControlMode::Position),
            HwCommand::SetMode(ControlMode::Velocity),
            HwCommand::SetMode(ControlMode::Position),
        ]);
    }
}
