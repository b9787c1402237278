//! Pure merge of queued deltas onto a progress snapshot.
//!
//! The completed/correct fields merge by set union, so applying deltas out of
//! order or more than once yields the same sets. `points` is a sum: applying
//! the same delta twice counts its points twice.

use crate::model::{ProgressDelta, ProgressSnapshot};

/// Fold deltas into a single aggregate (union of id sets, sum of points).
#[must_use]
pub fn aggregate<'a, I>(deltas: I) -> ProgressSnapshot
where
    I: IntoIterator<Item = &'a ProgressDelta>,
{
    let mut agg = ProgressSnapshot::empty();
    for delta in deltas {
        agg.completed.extend(delta.completed.iter().copied());
        agg.correct.extend(delta.correct.iter().copied());
        agg.points = agg.points.saturating_add(delta.points);
    }
    agg
}

/// Merge `deltas` onto `base`, producing a new snapshot.
#[must_use]
pub fn merge(base: &ProgressSnapshot, deltas: &[ProgressDelta]) -> ProgressSnapshot {
    let agg = aggregate(deltas);
    union(base, &agg)
}

/// Apply a single delta, as done for the optimistic local update.
#[must_use]
pub fn apply(base: &ProgressSnapshot, delta: &ProgressDelta) -> ProgressSnapshot {
    merge(base, std::slice::from_ref(delta))
}

fn union(base: &ProgressSnapshot, agg: &ProgressSnapshot) -> ProgressSnapshot {
    let mut merged = base.clone();
    merged.completed.extend(agg.completed.iter().copied());
    merged.correct.extend(agg.correct.iter().copied());
    merged.points = merged.points.saturating_add(agg.points);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{POINTS_PER_CORRECT, QuestionId};

    fn answer(id: u64, correct: bool) -> ProgressDelta {
        ProgressDelta::for_answer(QuestionId::new(id), correct, POINTS_PER_CORRECT)
    }

    fn ids(raw: &[u64]) -> Vec<QuestionId> {
        raw.iter().copied().map(QuestionId::new).collect()
    }

    #[test]
    fn merge_onto_empty_base() {
        let merged = merge(&ProgressSnapshot::empty(), &[answer(1, true), answer(2, false)]);
        assert_eq!(merged.completed.iter().copied().collect::<Vec<_>>(), ids(&[1, 2]));
        assert_eq!(merged.correct.iter().copied().collect::<Vec<_>>(), ids(&[1]));
        assert_eq!(merged.points, 100);
    }

    #[test]
    fn merge_with_no_deltas_is_identity() {
        let base = merge(&ProgressSnapshot::empty(), &[answer(3, true)]);
        assert_eq!(merge(&base, &[]), base);
    }

    #[test]
    fn reapplying_a_delta_keeps_sets_but_double_counts_points() {
        let d = answer(1, true);
        let once = apply(&ProgressSnapshot::empty(), &d);
        let twice = apply(&once, &d);
        assert_eq!(twice.completed, once.completed);
        assert_eq!(twice.correct, once.correct);
        // Known inflation: points are summed, not deduplicated by question id.
        assert_eq!(twice.points, 200);
    }

    #[test]
    fn points_saturate() {
        let mut base = ProgressSnapshot::empty();
        base.points = i64::MAX - 10;
        let merged = apply(&base, &answer(1, true));
        assert_eq!(merged.points, i64::MAX);
    }

    #[test]
    fn does_not_enforce_correct_subset_of_completed() {
        let odd = ProgressDelta {
            question_id: QuestionId::new(9),
            completed: Vec::new(),
            correct: ids(&[9]),
            points: 0,
        };
        let merged = apply(&ProgressSnapshot::empty(), &odd);
        assert!(merged.completed.is_empty());
        assert!(merged.correct.contains(&QuestionId::new(9)));
    }
}
