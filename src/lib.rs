pub mod actuation_sequencer;
pub mod actuator_hal;
pub mod arm_hal;
pub mod config;
pub mod connection;
pub mod distance_corrector;
pub mod distance_sampler;
pub mod distance_sensor_hal;
pub mod effector_driver;
pub mod error;
pub mod event_loop;
pub mod harvester;
pub mod harvester_hal_factory;
pub mod launcher;
pub mod motion;
pub mod pick_sequence;
pub mod sequence_coordinator;
pub mod sim;
pub mod telemetry;
pub mod vision;
