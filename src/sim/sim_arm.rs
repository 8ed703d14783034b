use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use log::debug;

use crate::arm_hal::{ArmHal, Frame, TargetPose};
use crate::sim::{lock, HwCommand, SimWorld};

const MM_PER_M: f64 = 1000.0;

pub struct SimArm {
    world: Arc<Mutex<SimWorld>>,
    frame: Frame,
}

impl SimArm {
    pub(super) fn new(world: Arc<Mutex<SimWorld>>) -> Self {
        Self { world, frame: Frame::Base }
    }
}

impl ArmHal for SimArm {
    fn select_frame(&mut self, frame: Frame) -> anyhow::Result<()> {
        debug!("select_frame: {frame:?}");
        self.frame = frame;
        lock(&self.world).record(HwCommand::SelectFrame(frame));
        Ok(())
    }

    fn move_relative(&mut self, delta: [f64; 6]) -> anyhow::Result<()> {
        debug!("move_relative: {delta:?} in {:?}", self.frame);
        let mut world = lock(&self.world);
        if self.frame == Frame::Tool && !world.faults.stall_depth_moves {
            world.standoff_mm -= delta[2] * MM_PER_M;
        }
        world.start_move();
        world.record(HwCommand::MoveRelative(delta));
        Ok(())
    }

    fn approach_target(&mut self, target: TargetPose, angle_deg: f64) -> anyhow::Result<()> {
        debug!("approach_target: {target:?} @ {angle_deg}");
        let mut world = lock(&self.world);
        if world.faults.fail_approach {
            return Err(anyhow!("approach rejected: target out of reach"));
        }
        world.start_move();
        world.record(HwCommand::ApproachTarget { target, angle_deg });
        Ok(())
    }

    fn is_move_finished(&self) -> anyhow::Result<bool> {
        Ok(lock(&self.world).is_move_finished())
    }

    fn go_home(&mut self) -> anyhow::Result<()> {
        debug!("go_home");
        let mut world = lock(&self.world);
        if world.faults.fail_go_home {
            return Err(anyhow!("controller refused home move"));
        }
        world.start_move();
        world.record(HwCommand::GoHome);
        Ok(())
    }

    fn set_alignment_point(&mut self, x: f64, depth: f64) -> anyhow::Result<()> {
        debug!("set_alignment_point: x={x:.3} depth={depth:.3}");
        lock(&self.world).record(HwCommand::SetAlignmentPoint { x, depth });
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        debug!("close");
        lock(&self.world).record(HwCommand::CloseArm);
        Ok(())
    }
}
