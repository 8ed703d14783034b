//! Simulated arm, gripper motor and distance sensor sharing one world model.  The binaries run on
//! it and the tests use it to script faults and to inspect every command that reached the
//! "hardware".

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use tokio::time::{Duration, Instant};

use crate::actuator_hal::{ActuatorHal, ControlMode};
use crate::arm_hal::{ArmHal, Frame, TargetPose};
use crate::distance_sensor_hal::DistanceSensorHal;
use crate::harvester_hal_factory::{BoardHandles, HardwareConnector};

mod sim_arm;
mod sim_board;

pub use sim_arm::SimArm;
pub use sim_board::{SimActuator, SimDistanceSensor};

/// Every command that was accepted, in order.  Rejected commands (injected faults) are not
/// recorded.
#[derive(Debug, PartialEq, Clone)]
pub enum HwCommand {
    SelectFrame(Frame),
    MoveRelative([f64; 6]),
    ApproachTarget { target: TargetPose, angle_deg: f64 },
    GoHome,
    SetAlignmentPoint { x: f64, depth: f64 },
    CloseArm,
    SetMode(ControlMode),
    GoalVelocity(i32),
    GoalPosition(i32),
    TorqueOff,
}

#[derive(Debug, Default, Clone)]
pub struct SimFaults {
    /// Reject this exact goal velocity.
    pub fail_goal_velocity: Option<i32>,
    pub fail_go_home: bool,
    pub fail_approach: bool,
    /// Depth moves are accepted but the gripper doesn't get any closer.
    pub stall_depth_moves: bool,
    pub never_finish_moves: bool,
    /// The sensor answers but never has a measurement.
    pub sensor_offline: bool,
}

#[derive(Debug)]
pub struct SimWorld {
    /// Sensor-to-target distance along the tool depth axis.
    pub standoff_mm: f64,
    /// Peak-to-peak sensor noise, uniformly distributed.
    pub noise_mm: f64,
    pub move_duration: Duration,
    pub mode: ControlMode,
    pub torque: bool,
    pub velocity: i32,
    pub position_raw: i32,
    pub faults: SimFaults,
    move_deadline: Option<Instant>,
    log: Vec<HwCommand>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self {
            standoff_mm: 180.0,
            noise_mm: 0.0,
            move_duration: Duration::from_millis(400),
            mode: ControlMode::Position,
            torque: true,
            velocity: 0,
            position_raw: 0,
            faults: SimFaults::default(),
            move_deadline: None,
            log: vec![],
        }
    }
}

impl SimWorld {
    fn record(&mut self, command: HwCommand) {
        self.log.push(command);
    }

    fn start_move(&mut self) {
        self.move_deadline = Some(Instant::now() + self.move_duration);
    }

    fn is_move_finished(&self) -> bool {
        if self.faults.never_finish_moves {
            return false;
        }
        self.move_deadline.map_or(true, |deadline| Instant::now() >= deadline)
    }
}

#[derive(Clone, Default)]
pub struct SimBench {
    world: Arc<Mutex<SimWorld>>,
}

impl SimBench {
    pub fn world(&self) -> MutexGuard<'_, SimWorld> {
        lock(&self.world)
    }

    pub fn commands(&self) -> Vec<HwCommand> {
        self.world().log.clone()
    }

    pub fn arm(&self) -> Box<dyn ArmHal + Send> {
        Box::new(SimArm::new(self.world.clone()))
    }

    pub fn actuator(&self) -> Box<dyn ActuatorHal + Send> {
        Box::new(SimActuator::new(self.world.clone()))
    }

    pub fn distance_sensor(&self) -> Box<dyn DistanceSensorHal + Send> {
        Box::new(SimDistanceSensor::new(self.world.clone()))
    }
}

/// Answers only on the endpoints listed as present, like a bench where just some of the
/// candidate ports have something plugged in.
pub struct SimConnector {
    bench: SimBench,
    present: Vec<String>,
}

impl SimConnector {
    pub fn new(bench: SimBench, present: Vec<String>) -> Self {
        Self { bench, present }
    }

    fn check_present(&self, endpoint: &str) -> anyhow::Result<()> {
        if self.present.iter().any(|p| p == endpoint) {
            Ok(())
        } else {
            Err(anyhow!("nothing attached at {endpoint}"))
        }
    }
}

impl HardwareConnector for SimConnector {
    fn connect_arm(&self, endpoint: &str) -> anyhow::Result<Box<dyn ArmHal + Send>> {
        self.check_present(endpoint)?;
        Ok(self.bench.arm())
    }

    fn connect_board(&self, endpoint: &str) -> anyhow::Result<BoardHandles> {
        self.check_present(endpoint)?;
        Ok(BoardHandles {
            actuator: self.bench.actuator(),
            sensor: self.bench.distance_sensor(),
        })
    }
}

fn lock(world: &Mutex<SimWorld>) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
