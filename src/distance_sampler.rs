use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration, Instant};

use crate::distance_sensor_hal::DistanceSensorHal;

const RETRY_DELAY: Duration = Duration::from_millis(30);
const WARMUP_DELAY: Duration = Duration::from_millis(20);
const MIN_READ_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    Median,
}

/// Aggregates raw time-of-flight readings into one distance.
pub struct DistanceSampler {
    sensor: Box<dyn DistanceSensorHal + Send>,
}

impl DistanceSampler {
    /// Takes ownership of the sensor and throws away `warmup_samples` readings, the first few
    /// after power-up are unreliable.
    pub async fn open(mut sensor: Box<dyn DistanceSensorHal + Send>, warmup_samples: usize) -> Self {
        for _ in 0..warmup_samples {
            if let Err(e) = sensor.read_distance_mm() {
                trace!("Warm-up read failed: {e:#}");
            }
            sleep(WARMUP_DELAY).await;
        }
        Self { sensor }
    }

    pub async fn read(&mut self, aggregation: Aggregation, samples: usize, timeout: Duration) -> Option<i32> {
        match aggregation {
            Aggregation::Mean => self.read_average(samples, timeout).await,
            Aggregation::Median => self.read_median(samples, timeout).await,
        }
    }

    pub async fn read_average(&mut self, samples: usize, timeout: Duration) -> Option<i32> {
        let values = self.collect(samples, timeout).await;
        if values.is_empty() {
            return None;
        }
        let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
        i32::try_from(sum / values.len() as i64).ok()
    }

    pub async fn read_median(&mut self, samples: usize, timeout: Duration) -> Option<i32> {
        let mut values = self.collect(samples, timeout).await;
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        let mid = values.len() / 2;
        if values.len() % 2 == 1 {
            Some(values[mid])
        } else {
            let pair = i64::from(values[mid - 1]) + i64::from(values[mid]);
            i32::try_from(pair / 2).ok()
        }
    }

    /// Polls until `samples` valid readings are in hand or the window closes.  Missing, zero,
    /// negative and failed reads are skipped with a short back-off.
    async fn collect(&mut self, samples: usize, timeout: Duration) -> Vec<i32> {
        let wanted = samples.max(1);
        let window = timeout.max(MIN_READ_WINDOW);
        let start = Instant::now();
        let mut values = Vec::with_capacity(wanted);
        while values.len() < wanted && start.elapsed() < window {
            match self.sensor.read_distance_mm() {
                Ok(Some(d)) if d > 0 => values.push(d),
                Ok(_) => sleep(RETRY_DELAY).await,
                Err(e) => {
                    debug!("Distance read failed: {e:#}");
                    sleep(RETRY_DELAY).await;
                }
            }
        }
        trace!("Collected {values:?} in {:?}", start.elapsed());
        values
    }
}
