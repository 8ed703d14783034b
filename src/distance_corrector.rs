use log::{info, warn};
use pid::Pid;
use tokio::time::sleep;

use crate::config::CorrectorConfig;
use crate::distance_sampler::DistanceSampler;
use crate::error::PickResult;
use crate::motion::ArmMotion;

const MM_PER_M: f64 = 1000.0;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct CorrectionSample {
    pub measured_mm: Option<i32>,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct CorrectionResult {
    pub converged: bool,
    pub iterations_used: u32,
}

/// Closes the loop between the distance sensor and the arm's tool-frame depth axis until the
/// gripper stands off the target by `target_mm` (± `tolerance_mm`).
pub struct DistanceCorrector<'a> {
    motion: &'a ArmMotion,
    sampler: &'a mut DistanceSampler,
}

impl<'a> DistanceCorrector<'a> {
    pub fn new(motion: &'a ArmMotion, sampler: &'a mut DistanceSampler) -> Self {
        Self { motion, sampler }
    }

    /// A missing reading or an exhausted iteration budget is reported through the result, not
    /// as an error.  Only arm failures come back as `Err`.
    pub async fn correct(&mut self, config: &CorrectorConfig) -> PickResult<CorrectionResult> {
        // Unit proportional term clamped at the step cap: the output is the bounded step
        // towards the setpoint, negated (positive output means the target is too close).
        let cap = f64::from(config.step_cap_mm);
        let mut step_controller = Pid::new(1.0, 0.0, 0.0, cap, cap, cap, cap, f64::from(config.target_mm));

        for iteration in 1..=config.max_iterations {
            let sample = CorrectionSample {
                measured_mm: self.sampler
                    .read(config.aggregation, config.samples, config.read_timeout())
                    .await,
            };
            let measured = match sample.measured_mm {
                Some(measured) if measured > 0 => measured,
                _ => {
                    warn!("No valid distance reading, skipping correction");
                    return Ok(CorrectionResult { converged: false, iterations_used: iteration });
                }
            };

            let error = measured - config.target_mm;
            info!("Distance {measured} mm, target {} mm, error {error} mm", config.target_mm);
            if error.abs() <= config.tolerance_mm {
                info!("Standoff within tolerance after {iteration} iteration(s)");
                return Ok(CorrectionResult { converged: true, iterations_used: iteration });
            }

            let step_mm = -step_controller.next_control_output(f64::from(measured)).output;
            let step_m = step_mm / MM_PER_M;
            info!("{} by {step_mm} mm ({step_m:.3} m)", if step_mm > 0.0 { "Approaching" } else { "Retreating" });
            self.motion.move_tool_depth(step_m).await?;
            sleep(config.settle()).await;
        }

        warn!("Gave up on standoff after {} iterations, accepting residual error", config.max_iterations);
        Ok(CorrectionResult { converged: false, iterations_used: config.max_iterations })
    }
}
