use futures_signals::signal::{Mutable, MutableSignal};
use log::debug;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SequenceState {
    Idle,
    Running,
}

/// Guards the single pick sequence allowed in flight.  The check and the transition to
/// `Running` happen under one lock so two racing triggers can never both win.
pub struct SequenceCoordinator {
    state: Mutable<SequenceState>,
}

impl Default for SequenceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCoordinator {
    pub fn new() -> Self {
        Self { state: Mutable::new(SequenceState::Idle) }
    }

    pub fn try_begin(&self) -> bool {
        let mut state = self.state.lock_mut();
        if *state == SequenceState::Running {
            return false;
        }
        *state = SequenceState::Running;
        debug!("Sequence state: Running");
        true
    }

    pub fn end(&self) {
        self.state.set_neq(SequenceState::Idle);
        debug!("Sequence state: Idle");
    }

    pub fn state(&self) -> SequenceState {
        self.state.get()
    }

    pub fn signal(&self) -> MutableSignal<SequenceState> {
        self.state.signal()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use futures_signals::signal::SignalExt;

    use super::*;

    #[test]
    fn test_second_begin_is_rejected() {
        let coordinator = SequenceCoordinator::new();
        assert!(coordinator.try_begin());
        assert!(!coordinator.try_begin());
        assert_eq!(coordinator.state(), SequenceState::Running);
        coordinator.end();
        assert_eq!(coordinator.state(), SequenceState::Idle);
        assert!(coordinator.try_begin());
    }

    #[test]
    fn test_racing_threads_admit_one() {
        let coordinator = Arc::new(SequenceCoordinator::new());
        let winners: usize = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                std::thread::spawn(move || coordinator.try_begin())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_signal_reports_transitions() {
        let coordinator = SequenceCoordinator::new();
        let mut states = coordinator.signal().to_stream();
        assert_eq!(states.next().await, Some(SequenceState::Idle));
        coordinator.try_begin();
        assert_eq!(states.next().await, Some(SequenceState::Running));
        coordinator.end();
        assert_eq!(states.next().await, Some(SequenceState::Idle));
    }
}
