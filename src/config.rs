use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::actuation_sequencer::{ActuationPhase, PhaseKind};
use crate::actuator_hal::Direction;
use crate::distance_sampler::Aggregation;

/// Everything tunable about a pick.  Every field has a default so a config file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PickConfig {
    pub corrector: CorrectorConfig,
    pub grasp: GraspConfig,
    pub motion: MotionConfig,
    pub hardware: HardwareConfig,
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    pub target_mm: i32,
    pub tolerance_mm: i32,
    pub step_cap_mm: i32,
    pub max_iterations: u32,
    pub aggregation: Aggregation,
    pub samples: usize,
    pub read_timeout_secs: f64,
    pub settle_secs: f64,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            target_mm: 70,
            tolerance_mm: 10,
            step_cap_mm: 60,
            max_iterations: 8,
            aggregation: Aggregation::Mean,
            samples: 4,
            read_timeout_secs: 1.2,
            settle_secs: 0.1,
        }
    }
}

impl CorrectorConfig {
    pub fn read_timeout(&self) -> Duration {
        secs(self.read_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraspConfig {
    pub speed: u32,
    pub open_secs: f64,
    pub close_secs: f64,
    pub reopen_secs: f64,
    pub inter_phase_pause_secs: f64,
    pub final_settle_secs: f64,
}

impl Default for GraspConfig {
    fn default() -> Self {
        Self {
            speed: 100,
            open_secs: 2.0,
            close_secs: 3.5,
            reopen_secs: 2.0,
            inter_phase_pause_secs: 1.0,
            final_settle_secs: 1.0,
        }
    }
}

impl GraspConfig {
    /// The fixed open, close, reopen script.  Only the last phase restores position holding.
    pub fn phases(&self) -> Vec<ActuationPhase> {
        vec![
            ActuationPhase {
                kind: PhaseKind::Open,
                direction: Direction::Forward,
                duration: secs(self.open_secs),
                speed: self.speed,
                restore_holding_mode: false,
            },
            ActuationPhase {
                kind: PhaseKind::Close,
                direction: Direction::Reverse,
                duration: secs(self.close_secs),
                speed: self.speed,
                restore_holding_mode: false,
            },
            ActuationPhase {
                kind: PhaseKind::ReopenAndRestore,
                direction: Direction::Forward,
                duration: secs(self.reopen_secs),
                speed: self.speed,
                restore_holding_mode: true,
            },
        ]
    }

    pub fn inter_phase_pause(&self) -> Duration {
        secs(self.inter_phase_pause_secs)
    }

    pub fn final_settle(&self) -> Duration {
        secs(self.final_settle_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Upper bound on any single wait for the arm to report a finished move.
    pub timeout_secs: f64,
    pub poll_interval_ms: u64,
    pub approach_settle_secs: f64,
    pub pre_home_settle_secs: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            poll_interval_ms: 20,
            approach_settle_secs: 0.15,
            pre_home_settle_secs: 0.15,
        }
    }
}

impl MotionConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn approach_settle(&self) -> Duration {
        secs(self.approach_settle_secs)
    }

    pub fn pre_home_settle(&self) -> Duration {
        secs(self.pre_home_settle_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Tried in order, first success wins.
    pub arm_endpoints: Vec<String>,
    /// Tried in order, first success wins.  The board carries both the gripper motor and the
    /// distance sensor.
    pub board_endpoints: Vec<String>,
    pub sensor_warmup_samples: usize,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            arm_endpoints: vec!["192.168.0.6".to_owned()],
            board_endpoints: vec!["/dev/ttyACM0".to_owned(), "/dev/ttyACM1".to_owned()],
            sensor_warmup_samples: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub channel_capacity: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self { channel_capacity: 32 }
    }
}

impl PickConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        let config: PickConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("corrector.read_timeout_secs", self.corrector.read_timeout_secs),
            ("corrector.settle_secs", self.corrector.settle_secs),
            ("grasp.open_secs", self.grasp.open_secs),
            ("grasp.close_secs", self.grasp.close_secs),
            ("grasp.reopen_secs", self.grasp.reopen_secs),
            ("grasp.inter_phase_pause_secs", self.grasp.inter_phase_pause_secs),
            ("grasp.final_settle_secs", self.grasp.final_settle_secs),
            ("motion.timeout_secs", self.motion.timeout_secs),
            ("motion.approach_settle_secs", self.motion.approach_settle_secs),
            ("motion.pre_home_settle_secs", self.motion.pre_home_settle_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{name} must be a finite, non-negative number of seconds (got {value})"));
            }
        }
        if self.corrector.max_iterations == 0 {
            return Err(anyhow!("corrector.max_iterations must be at least 1"));
        }
        if self.corrector.samples == 0 {
            return Err(anyhow!("corrector.samples must be at least 1"));
        }
        if self.corrector.target_mm <= 0 {
            return Err(anyhow!("corrector.target_mm must be positive (got {})", self.corrector.target_mm));
        }
        if self.corrector.tolerance_mm < 0 || self.corrector.step_cap_mm <= 0 {
            return Err(anyhow!("corrector tolerance must be >= 0 and step cap > 0"));
        }
        if self.vision.channel_capacity == 0 {
            return Err(anyhow!("vision.channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}
