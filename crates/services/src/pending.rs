use std::collections::BTreeMap;
use std::sync::Mutex;

use prep_core::model::{ProgressDelta, QuestionId};
use tracing::warn;

/// Answer deltas that have not been persisted yet, one per question id.
#[derive(Debug)]
pub struct PendingQueue {
    deltas: Mutex<BTreeMap<QuestionId, ProgressDelta>>,
    retry_cap: usize,
}

impl PendingQueue {
    #[must_use]
    pub fn new(retry_cap: usize) -> Self {
        Self {
            deltas: Mutex::new(BTreeMap::new()),
            retry_cap,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<QuestionId, ProgressDelta>> {
        // The map holds plain data; a panic mid-insert cannot leave it inconsistent.
        self.deltas
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue a delta, replacing any unflushed delta for the same question.
    pub fn enqueue(&self, delta: ProgressDelta) {
        self.lock().insert(delta.question_id, delta);
    }

    /// Empty the queue, returning its contents for the caller to persist.
    #[must_use]
    pub fn drain(&self) -> Vec<ProgressDelta> {
        std::mem::take(&mut *self.lock()).into_values().collect()
    }

    /// Put deltas from a failed save back.
    ///
    /// A delta enqueued for the same question while the save was in flight is
    /// newer and is kept. Deltas that would grow the queue past the retry cap
    /// are dropped; the number dropped is returned.
    pub fn requeue(&self, deltas: Vec<ProgressDelta>) -> usize {
        let mut guard = self.lock();
        let mut dropped = 0;
        for delta in deltas {
            if guard.contains_key(&delta.question_id) {
                continue;
            }
            if guard.len() >= self.retry_cap {
                dropped += 1;
                continue;
            }
            guard.insert(delta.question_id, delta);
        }
        if dropped > 0 {
            warn!(dropped, cap = self.retry_cap, "retry cap reached, dropping deltas");
        }
        dropped
    }

    /// Copy of the queued deltas without draining.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProgressDelta> {
        self.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(id: u64, points: i64) -> ProgressDelta {
        ProgressDelta {
            question_id: QuestionId::new(id),
            completed: vec![QuestionId::new(id)],
            correct: Vec::new(),
            points,
        }
    }

    #[test]
    fn later_delta_for_same_question_wins() {
        let queue = PendingQueue::new(10);
        queue.enqueue(delta(1, 0));
        queue.enqueue(delta(1, 100));
        let drained = queue.drain();
        assert_eq!(drained, vec![delta(1, 100)]);
    }

    #[test]
    fn drain_empties_queue() {
        let queue = PendingQueue::new(10);
        queue.enqueue(delta(1, 0));
        queue.enqueue(delta(2, 0));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn requeue_restores_failed_batch() {
        let queue = PendingQueue::new(10);
        for id in 1..=10 {
            queue.enqueue(delta(id, 100));
        }
        let drained = queue.drain();
        let dropped = queue.requeue(drained.clone());
        assert_eq!(dropped, 0);
        assert_eq!(queue.snapshot(), drained);
    }

    #[test]
    fn requeue_keeps_newer_delta() {
        let queue = PendingQueue::new(10);
        queue.enqueue(delta(1, 0));
        let drained = queue.drain();
        queue.enqueue(delta(1, 100));
        queue.requeue(drained);
        assert_eq!(queue.snapshot(), vec![delta(1, 100)]);
    }

    #[test]
    fn requeue_is_bounded_by_retry_cap() {
        let queue = PendingQueue::new(3);
        let batch: Vec<_> = (1..=5).map(|id| delta(id, 0)).collect();
        let dropped = queue.requeue(batch);
        assert_eq!(dropped, 2);
        assert_eq!(queue.len(), 3);
    }
}
