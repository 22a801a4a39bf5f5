//! Batch state machine.
//!
//! # States
//! - **Pending**: created, no work dispatched.
//! - **Running**: units are being dispatched.
//! - **Completed** / **Failed** / **Cancelled**: terminal.

use std::sync::Arc;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Observer of batch state changes.
pub trait BatchObserver: Send + Sync {
    fn on_state_change(&self, batch: &str, from: BatchState, to: BatchState);
}

pub struct BatchStateMachine {
    label: &'static str,
    current: BatchState,
    observers: Vec<Arc<dyn BatchObserver>>,
}

impl BatchStateMachine {
    pub fn new(label: &'static str, observers: Vec<Arc<dyn BatchObserver>>) -> Self {
        Self {
            label,
            current: BatchState::Pending,
            observers,
        }
    }

    pub fn state(&self) -> BatchState {
        self.current
    }

    fn transition(&mut self, next: BatchState) {
        let from = self.current;
        log::info!("{} batch: {:?} -> {:?}", self.label, from, next);
        self.current = next;
        for observer in &self.observers {
            observer.on_state_change(self.label, from, next);
        }
    }

    /// Pending -> Running.
    pub fn start(&mut self) -> Result<(), Error> {
        match self.current {
            BatchState::Pending => {
                self.transition(BatchState::Running);
                Ok(())
            }
            other => Err(Error::Internal(format!(
                "{} batch cannot start from {:?}",
                self.label, other
            ))),
        }
    }

    /// Running -> Completed, Failed or Cancelled according to `outcome`,
    /// which is passed through.
    pub fn finish<T>(&mut self, outcome: Result<T, Error>) -> Result<T, Error> {
        if self.current != BatchState::Running {
            return Err(Error::Internal(format!(
                "{} batch cannot finish from {:?}",
                self.label, self.current
            )));
        }
        let next = match &outcome {
            Ok(_) => BatchState::Completed,
            Err(Error::Cancelled) => BatchState::Cancelled,
            Err(_) => BatchState::Failed,
        };
        self.transition(next);
        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every transition it observes.
    #[derive(Default)]
    pub(crate) struct Recorder(pub Mutex<Vec<(BatchState, BatchState)>>);

    impl BatchObserver for Recorder {
        fn on_state_change(&self, _batch: &str, from: BatchState, to: BatchState) {
            self.0.lock().unwrap().push((from, to));
        }
    }

    #[test]
    fn test_completed_flow() {
        let recorder = Arc::new(Recorder::default());
        let mut machine = BatchStateMachine::new("test", vec![recorder.clone() as Arc<dyn BatchObserver>]);
        assert_eq!(machine.state(), BatchState::Pending);
        machine.start().unwrap();
        assert_eq!(machine.finish(Ok(7)).unwrap(), 7);
        assert_eq!(machine.state(), BatchState::Completed);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                (BatchState::Pending, BatchState::Running),
                (BatchState::Running, BatchState::Completed)
            ]
        );
    }

    #[test]
    fn test_failed_and_cancelled() {
        let mut failed = BatchStateMachine::new("test", Vec::new());
        failed.start().unwrap();
        assert!(failed.finish::<()>(Err(Error::Internal("boom".into()))).is_err());
        assert_eq!(failed.state(), BatchState::Failed);

        let mut cancelled = BatchStateMachine::new("test", Vec::new());
        cancelled.start().unwrap();
        assert!(matches!(cancelled.finish::<()>(Err(Error::Cancelled)), Err(Error::Cancelled)));
        assert_eq!(cancelled.state(), BatchState::Cancelled);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = BatchStateMachine::new("test", Vec::new());
        assert!(machine.finish(Ok(())).is_err());
        machine.start().unwrap();
        assert!(machine.start().is_err());
        machine.finish(Ok(())).unwrap();
        assert!(machine.start().is_err());
    }
}
