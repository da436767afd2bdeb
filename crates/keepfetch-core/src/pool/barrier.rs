//! Completion tally: one signal per task, never zero, never duplicated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::report::TaskOutcome;
use crate::error::TaskError;

#[derive(Debug)]
pub(crate) struct CompletionBarrier {
    outcomes: Mutex<Vec<Option<TaskOutcome>>>,
    completed: AtomicUsize,
}

impl CompletionBarrier {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            outcomes: Mutex::new((0..total).map(|_| None).collect()),
            completed: AtomicUsize::new(0),
        }
    }

    /// Record `index`'s outcome. Returns false (and keeps the first outcome)
    /// if the index already completed or is out of range.
    pub(crate) fn complete(&self, index: usize, outcome: TaskOutcome) -> bool {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = outcomes.get_mut(index) else {
            tracing::error!(index, "completion for unknown task ignored");
            return false;
        };
        if slot.is_some() {
            tracing::error!(index, "duplicate completion ignored");
            return false;
        }
        *slot = Some(outcome);
        self.completed.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn is_resolved(&self) -> bool {
        let total = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).len();
        self.completed() == total
    }

    /// Drain the outcomes in index order. A task whose slot died before it
    /// reported is recorded as `SlotPanicked` so the count stays exact.
    pub(crate) fn take_outcomes(&self) -> Vec<TaskOutcome> {
        let outcomes =
            std::mem::take(&mut *self.outcomes.lock().unwrap_or_else(PoisonError::into_inner));
        outcomes
            .into_iter()
            .enumerate()
            .map(|(index, o)| {
                o.unwrap_or_else(|| {
                    tracing::error!(index, "task never reported completion");
                    TaskOutcome::Failed(TaskError::SlotPanicked)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> TaskOutcome {
        TaskOutcome::Written {
            bytes: 1,
            partial: false,
        }
    }

    #[test]
    fn resolves_after_every_index() {
        let b = CompletionBarrier::new(3);
        assert!(!b.is_resolved());
        assert!(b.complete(2, ok()));
        assert!(b.complete(0, ok()));
        assert!(!b.is_resolved());
        assert!(b.complete(1, TaskOutcome::Failed(TaskError::Status { code: 500 })));
        assert!(b.is_resolved());
        assert_eq!(b.completed(), 3);
    }

    #[test]
    fn duplicate_and_unknown_are_ignored() {
        let b = CompletionBarrier::new(1);
        assert!(b.complete(0, ok()));
        assert!(!b.complete(0, TaskOutcome::Failed(TaskError::Status { code: 500 })));
        assert!(!b.complete(7, ok()));
        assert_eq!(b.completed(), 1);
        assert!(b.take_outcomes()[0].is_written());
    }

    #[test]
    fn missing_outcomes_become_slot_failures() {
        let b = CompletionBarrier::new(2);
        b.complete(1, ok());
        let outcomes = b.take_outcomes();
        assert!(matches!(
            outcomes[0],
            TaskOutcome::Failed(TaskError::SlotPanicked)
        ));
        assert!(outcomes[1].is_written());
    }
}
