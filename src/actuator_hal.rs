use serde::{Deserialize, Serialize};

/// Raw position range of the gripper motor and the angle span it maps to.
pub const POSITION_RAW_MAX: i32 = 1023;
pub const POSITION_SPAN_DEG: f64 = 200.0;

pub trait ActuatorHal {
    /// Switches operating mode.  Implementations drop torque for the switch and re-enable it.
    fn set_operating_mode(&mut self, mode: ControlMode) -> anyhow::Result<()>;
    fn set_goal_velocity(&mut self, velocity: i32) -> anyhow::Result<()>;
    fn set_goal_position(&mut self, position_raw: i32) -> anyhow::Result<()>;
    fn present_position(&self) -> anyhow::Result<i32>;
    fn torque_off(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ControlMode {
    /// Continuous rotation.
    Velocity,
    /// Position holding.
    Position,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn signed(self, speed: u32) -> i32 {
        let magnitude = i32::try_from(speed).unwrap_or(i32::MAX);
        match self {
            Direction::Forward => magnitude,
            Direction::Reverse => -magnitude,
        }
    }
}

pub fn raw_to_angle_deg(raw: i32) -> f64 {
    f64::from(raw) * POSITION_SPAN_DEG / f64::from(POSITION_RAW_MAX)
}
