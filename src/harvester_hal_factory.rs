use log::{info, warn};

use crate::actuator_hal::{raw_to_angle_deg, ActuatorHal, ControlMode};
use crate::arm_hal::ArmHal;
use crate::config::HardwareConfig;
use crate::connection::{resolve_first, ConnectionError};
use crate::distance_sensor_hal::DistanceSensorHal;

/// Opens a device behind an endpoint (a serial port, a controller address, ...).
pub trait HardwareConnector {
    fn connect_arm(&self, endpoint: &str) -> anyhow::Result<Box<dyn ArmHal + Send>>;
    fn connect_board(&self, endpoint: &str) -> anyhow::Result<BoardHandles>;
}

/// The controller board carries both the gripper motor and the distance sensor.
pub struct BoardHandles {
    pub actuator: Box<dyn ActuatorHal + Send>,
    pub sensor: Box<dyn DistanceSensorHal + Send>,
}

pub struct HarvesterHal {
    pub arm: Box<dyn ArmHal + Send>,
    pub actuator: Box<dyn ActuatorHal + Send>,
    pub sensor: Box<dyn DistanceSensorHal + Send>,
}

pub struct HarvesterHalFactory<'a> {
    connector: &'a dyn HardwareConnector,
    config: &'a HardwareConfig,
}

impl<'a> HarvesterHalFactory<'a> {
    pub fn new(connector: &'a dyn HardwareConnector, config: &'a HardwareConfig) -> Self {
        Self { connector, config }
    }

    pub fn create_hal(&self) -> Result<HarvesterHal, ConnectionError> {
        let (_, mut board) = resolve_first("controller board", &self.config.board_endpoints, |endpoint| {
            self.connector.connect_board(endpoint)
        })?;
        initialize_actuator(board.actuator.as_mut());
        let (_, arm) = resolve_first("arm", &self.config.arm_endpoints, |endpoint| {
            self.connector.connect_arm(endpoint)
        })?;
        Ok(HarvesterHal { arm, actuator: board.actuator, sensor: board.sensor })
    }
}

/// Start out holding position with torque on.  Failing to read the position back is not fatal.
fn initialize_actuator(actuator: &mut dyn ActuatorHal) {
    if let Err(e) = actuator.set_operating_mode(ControlMode::Position) {
        warn!("Could not put the gripper into position mode: {e:#}");
    }
    match actuator.present_position() {
        Ok(raw) => info!("Gripper at {:.1}°", raw_to_angle_deg(raw)),
        Err(e) => warn!("Could not read gripper position, assuming 0°: {e:#}"),
    }
}
