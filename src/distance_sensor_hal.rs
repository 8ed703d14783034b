pub trait DistanceSensorHal {
    /// Single raw time-of-flight reading in millimetres.  `Ok(None)` means the sensor answered
    /// without a measurement.
    fn read_distance_mm(&mut self) -> anyhow::Result<Option<i32>>;
}
