use std::time::Duration;

use thiserror::Error;

use crate::actuation_sequencer::PhaseKind;

/// Failures that end a pick attempt.  They never leave the pick worker; the launcher logs them
/// and homes the arm regardless.
#[derive(Error, Debug)]
pub enum PickError {
    #[error("arm motion failed: {0:#}")]
    Motion(anyhow::Error),
    #[error("arm motion did not finish within {0:?}")]
    MotionTimeout(Duration),
    #[error("{phase:?} phase failed: {cause:#}")]
    Actuation { phase: PhaseKind, cause: anyhow::Error },
    #[error("homing failed: {0}")]
    Homing(#[source] Box<PickError>),
}

pub type PickResult<T> = Result<T, PickError>;
