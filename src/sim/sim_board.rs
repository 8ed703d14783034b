use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use conv::{ConvUtil, RoundToNearest};
use log::debug;
use rand::Rng;

use crate::actuator_hal::{ActuatorHal, ControlMode};
use crate::distance_sensor_hal::DistanceSensorHal;
use crate::sim::{lock, HwCommand, SimWorld};

pub struct SimActuator {
    world: Arc<Mutex<SimWorld>>,
}

impl SimActuator {
    pub(super) fn new(world: Arc<Mutex<SimWorld>>) -> Self {
        Self { world }
    }
}

impl ActuatorHal for SimActuator {
    fn set_operating_mode(&mut self, mode: ControlMode) -> anyhow::Result<()> {
        debug!("set_operating_mode: {mode:?}");
        let mut world = lock(&self.world);
        world.torque = false;
        world.mode = mode;
        world.torque = true;
        world.record(HwCommand::SetMode(mode));
        Ok(())
    }

    fn set_goal_velocity(&mut self, velocity: i32) -> anyhow::Result<()> {
        debug!("set_goal_velocity: {velocity}");
        let mut world = lock(&self.world);
        if world.faults.fail_goal_velocity == Some(velocity) {
            return Err(anyhow!("no status packet for goal velocity {velocity}"));
        }
        if velocity != 0 && world.mode != ControlMode::Velocity {
            return Err(anyhow!("goal velocity {velocity} while in {:?} mode", world.mode));
        }
        world.velocity = velocity;
        world.record(HwCommand::GoalVelocity(velocity));
        Ok(())
    }

    fn set_goal_position(&mut self, position_raw: i32) -> anyhow::Result<()> {
        debug!("set_goal_position: {position_raw}");
        let mut world = lock(&self.world);
        if world.mode != ControlMode::Position {
            return Err(anyhow!("goal position while in {:?} mode", world.mode));
        }
        world.position_raw = position_raw;
        world.record(HwCommand::GoalPosition(position_raw));
        Ok(())
    }

    fn present_position(&self) -> anyhow::Result<i32> {
        Ok(lock(&self.world).position_raw)
    }

    fn torque_off(&mut self) -> anyhow::Result<()> {
        debug!("torque_off");
        let mut world = lock(&self.world);
        world.torque = false;
        world.record(HwCommand::TorqueOff);
        Ok(())
    }
}

pub struct SimDistanceSensor {
    world: Arc<Mutex<SimWorld>>,
}

impl SimDistanceSensor {
    pub(super) fn new(world: Arc<Mutex<SimWorld>>) -> Self {
        Self { world }
    }
}

impl DistanceSensorHal for SimDistanceSensor {
    fn read_distance_mm(&mut self) -> anyhow::Result<Option<i32>> {
        let world = lock(&self.world);
        if world.faults.sensor_offline {
            return Ok(None);
        }
        let noise = if world.noise_mm > 0.0 {
            let half = world.noise_mm / 2.0;
            rand::thread_rng().gen_range(-half..=half)
        } else {
            0.0
        };
        let reading = (world.standoff_mm + noise)
            .approx_as_by::<i32, RoundToNearest>()
            .map_err(|e| anyhow!("distance out of sensor range: {e:?}"))?;
        Ok(Some(reading))
    }
}
