use std::sync::{Mutex, MutexGuard, PoisonError};

use prep_core::model::{ProgressDelta, ProgressSnapshot};
use prep_core::reducer;

use super::stamp::SaveStamp;

#[derive(Debug, Default)]
struct State {
    snapshot: ProgressSnapshot,
    latest: SaveStamp,
}

/// The session's local view of progress and the stamp of the latest save.
#[derive(Debug, Default)]
pub struct LocalProgress {
    state: Mutex<State>,
}

impl LocalProgress {
    #[must_use]
    pub fn new(initial: ProgressSnapshot) -> Self {
        Self {
            state: Mutex::new(State {
                snapshot: initial,
                latest: SaveStamp::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    /// Optimistically fold one answer into local state.
    pub fn apply(&self, delta: &ProgressDelta) -> ProgressSnapshot {
        let mut state = self.lock();
        state.snapshot = reducer::apply(&state.snapshot, delta);
        state.snapshot.clone()
    }

    /// Issue the stamp for a new save cycle.
    pub fn begin_save(&self) -> SaveStamp {
        let mut state = self.lock();
        state.latest = state.latest.next();
        state.latest
    }

    #[must_use]
    pub fn latest_stamp(&self) -> SaveStamp {
        self.lock().latest
    }

    /// Replace local state with a persisted snapshot if `stamp` is still the
    /// latest issued. Deltas still waiting to be saved are folded back on top
    /// so answers made during the save stay visible.
    ///
    /// Returns whether the snapshot was applied.
    pub fn reconcile(
        &self,
        stamp: SaveStamp,
        persisted: ProgressSnapshot,
        still_pending: &[ProgressDelta],
    ) -> bool {
        let mut state = self.lock();
        if stamp != state.latest {
            return false;
        }
        state.snapshot = reducer::merge(&persisted, still_pending);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::QuestionId;

    fn answered(id: u64, points: i64) -> ProgressSnapshot {
        let mut snap = ProgressSnapshot::empty();
        snap.completed.insert(QuestionId::new(id));
        snap.points = points;
        snap
    }

    #[test]
    fn stamps_are_monotonic() {
        let local = LocalProgress::default();
        let a = local.begin_save();
        let b = local.begin_save();
        assert!(b > a);
        assert_eq!(local.latest_stamp(), b);
    }

    #[test]
    fn stale_result_is_discarded() {
        let local = LocalProgress::default();
        let a = local.begin_save();
        let b = local.begin_save();

        assert!(local.reconcile(b, answered(2, 200), &[]));
        assert!(!local.reconcile(a, answered(1, 100), &[]));
        assert_eq!(local.snapshot(), answered(2, 200));
    }

    #[test]
    fn reconcile_keeps_pending_answers_visible() {
        let local = LocalProgress::default();
        let stamp = local.begin_save();
        let pending = ProgressDelta::for_answer(QuestionId::new(7), true, 100);

        assert!(local.reconcile(stamp, answered(1, 100), std::slice::from_ref(&pending)));
        let snap = local.snapshot();
        assert!(snap.has_completed(QuestionId::new(1)));
        assert!(snap.has_completed(QuestionId::new(7)));
        assert_eq!(snap.points, 200);
    }
}
