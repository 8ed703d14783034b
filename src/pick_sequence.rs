use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{error, info, warn};
use tokio::time::sleep;

use crate::actuation_sequencer::ActuationSequencer;
use crate::actuator_hal::ActuatorHal;
use crate::arm_hal::SharedArm;
use crate::config::PickConfig;
use crate::distance_corrector::{CorrectionResult, DistanceCorrector};
use crate::distance_sampler::DistanceSampler;
use crate::distance_sensor_hal::DistanceSensorHal;
use crate::effector_driver::EffectorDriver;
use crate::error::{PickError, PickResult};
use crate::motion::ArmMotion;
use crate::telemetry::{TelemetryMessage, TelemetrySink};
use crate::vision::PickRequest;

/// Outcome of one accepted pick request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SequenceReport {
    pub correction: Option<CorrectionResult>,
    pub final_distance_mm: Option<i32>,
    pub grasp_completed: bool,
    pub homed: bool,
    /// The error that ended the attempt early, if any.
    pub error: Option<String>,
}

/// Owns everything the pick worker drives: the arm motion helper, the distance sampler and the
/// gripper sequencer.
pub struct PickSequence {
    motion: ArmMotion,
    sampler: DistanceSampler,
    sequencer: ActuationSequencer,
    telemetry: Box<dyn TelemetrySink>,
    config: PickConfig,
}

impl PickSequence {
    pub fn new(
        motion: ArmMotion,
        sampler: DistanceSampler,
        sequencer: ActuationSequencer,
        telemetry: Box<dyn TelemetrySink>,
        config: PickConfig,
    ) -> Self {
        Self { motion, sampler, sequencer, telemetry, config }
    }

    /// Wires the connected devices together, warming up the distance sensor on the way.
    pub async fn assemble(
        arm: SharedArm,
        actuator: Box<dyn ActuatorHal + Send>,
        sensor: Box<dyn DistanceSensorHal + Send>,
        telemetry: Box<dyn TelemetrySink>,
        config: PickConfig,
    ) -> Self {
        let motion = ArmMotion::new(arm, &config.motion);
        let sampler = DistanceSampler::open(sensor, config.hardware.sensor_warmup_samples).await;
        let sequencer = ActuationSequencer::new(EffectorDriver::new(actuator), &config.grasp);
        Self::new(motion, sampler, sequencer, telemetry, config)
    }

    /// Never fails: whatever happens during the attempt, a panic included, the arm is sent home
    /// afterwards.
    pub async fn run(&mut self, request: &PickRequest) -> SequenceReport {
        let mut report = SequenceReport::default();
        let outcome = AssertUnwindSafe(self.attempt(request, &mut report)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Pick attempt failed: {e}");
                report.error = Some(e.to_string());
            }
            Err(panic) => {
                let message = format!("pick attempt panicked: {}", panic_message(&*panic));
                error!("{message}");
                report.error = Some(message);
            }
        }
        match self.home().await {
            Ok(()) => report.homed = true,
            Err(e) => error!("{}", PickError::Homing(Box::new(e))),
        }
        report
    }

    async fn attempt(&mut self, request: &PickRequest, report: &mut SequenceReport) -> PickResult<()> {
        self.motion.approach(request.target, request.angle).await?;
        sleep(self.config.motion.approach_settle()).await;

        let corrector_config = &self.config.corrector;
        let correction = DistanceCorrector::new(&self.motion, &mut self.sampler)
            .correct(corrector_config)
            .await?;
        report.correction = Some(correction);
        if !correction.converged {
            warn!("Grasping without a confirmed standoff ({} iteration(s))", correction.iterations_used);
        }

        report.final_distance_mm = self.sampler
            .read(corrector_config.aggregation, corrector_config.samples, corrector_config.read_timeout())
            .await;
        match report.final_distance_mm {
            Some(mm) => info!("Final distance {mm} mm"),
            None => warn!("Final distance unavailable"),
        }

        let phases = self.config.grasp.phases();
        self.sequencer.run_grasp_cycle(&phases).await?;
        report.grasp_completed = true;

        if let Err(e) = self.telemetry.record(&TelemetryMessage::Count) {
            warn!("Failed to report pick: {e:#}");
        }
        Ok(())
    }

    async fn home(&mut self) -> PickResult<()> {
        sleep(self.config.motion.pre_home_settle()).await;
        info!("Homing");
        self.motion.go_home().await
    }

    /// Releases the gripper and disconnects the arm.  Both are attempted even if the first fails.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        let effector = self.sequencer.driver_mut().shutdown();
        let arm = self.motion.arm().lock().await.close();
        effector.and(arm)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::actuator_hal::ControlMode;
    use crate::arm_hal::{share_arm, TargetPose};
    use crate::sim::{HwCommand, SimBench};

    use super::*;

    struct CountingTelemetry(Arc<Mutex<u32>>);

    impl TelemetrySink for CountingTelemetry {
        fn record(&mut self, message: &TelemetryMessage) -> anyhow::Result<()> {
            assert_eq!(message, &TelemetryMessage::Count);
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    async fn pick_sequence(bench: &SimBench, counts: Arc<Mutex<u32>>) -> PickSequence {
        PickSequence::assemble(
            share_arm(bench.arm()),
            bench.actuator(),
            bench.distance_sensor(),
            Box::new(CountingTelemetry(counts)),
            PickConfig::default(),
        ).await
    }

    fn request() -> PickRequest {
        PickRequest { target: TargetPose::new(0.3, 0.1, 0.4), angle: 20.0 }
    }

    fn home_count(bench: &SimBench) -> usize {
        bench.commands().iter().filter(|c| **c == HwCommand::GoHome).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pick() {
        let bench = SimBench::default();
        bench.world().standoff_mm = 130.0;
        let counts = Arc::new(Mutex::new(0));
        let mut sequence = pick_sequence(&bench, counts.clone()).await;

        let report = sequence.run(&request()).await;

        assert_eq!(report.correction, Some(CorrectionResult { converged: true, iterations_used: 2 }));
        assert_eq!(report.final_distance_mm, Some(70));
        assert!(report.grasp_completed);
        assert!(report.homed);
        assert_eq!(report.error, None);
        assert_eq!(*counts.lock().unwrap(), 1);

        let commands = bench.commands();
        assert_eq!(commands[0], HwCommand::ApproachTarget { target: TargetPose::new(0.3, 0.1, 0.4), angle_deg: 20.0 });
        assert_eq!(commands.last(), Some(&HwCommand::GoHome));
        assert_eq!(bench.world().mode, ControlMode::Position);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grasp_runs_without_distance() {
        let bench = SimBench::default();
        bench.world().faults.sensor_offline = true;
        let mut sequence = pick_sequence(&bench, Arc::new(Mutex::new(0))).await;

        let report = sequence.run(&request()).await;

        assert_eq!(report.correction, Some(CorrectionResult { converged: false, iterations_used: 1 }));
        assert_eq!(report.final_distance_mm, None);
        assert!(report.grasp_completed);
        assert!(report.homed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_approach_still_homes() {
        let bench = SimBench::default();
        bench.world().faults.fail_approach = true;
        let counts = Arc::new(Mutex::new(0));
        let mut sequence = pick_sequence(&bench, counts.clone()).await;

        let report = sequence.run(&request()).await;

        assert!(report.error.is_some());
        assert!(!report.grasp_completed);
        assert!(report.homed);
        assert_eq!(bench.commands(), vec![HwCommand::GoHome]);
        assert_eq!(*counts.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_homing_failure_is_reported_not_retried() {
        let bench = SimBench::default();
        bench.world().faults.fail_go_home = true;
        let mut sequence = pick_sequence(&bench, Arc::new(Mutex::new(0))).await;

        let report = sequence.run(&request()).await;

        assert!(report.grasp_completed);
        assert!(!report.homed);
        assert_eq!(home_count(&bench), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_everything() {
        let bench = SimBench::default();
        let mut sequence = pick_sequence(&bench, Arc::new(Mutex::new(0))).await;
        sequence.shutdown().await.unwrap();
        let commands = bench.commands();
        assert!(commands.contains(&HwCommand::TorqueOff));
        assert_eq!(commands.last(), Some(&HwCommand::CloseArm));
    }
}
