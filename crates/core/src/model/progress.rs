use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{QuestionId, UserId};

/// Points awarded for a correct answer.
pub const POINTS_PER_CORRECT: i64 = 100;

//
// ─── KEY ───────────────────────────────────────────────────────────────────────
//

/// The (user, topic, area) tuple a remote progress row is unique on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressKey {
    pub user_id: UserId,
    pub topic: String,
    pub area: String,
}

impl ProgressKey {
    #[must_use]
    pub fn new(user_id: UserId, topic: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            user_id,
            topic: topic.into(),
            area: area.into(),
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.topic, self.area)
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Full progress state for one `ProgressKey` at a point in time.
///
/// `correct ⊆ completed` is expected but not enforced; merges only ever union
/// the two sets independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed: BTreeSet<QuestionId>,
    pub correct: BTreeSet<QuestionId>,
    pub points: i64,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_completed(&self, id: QuestionId) -> bool {
        self.completed.contains(&id)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.correct.len()
    }

    /// Ratio of correct to completed questions, `0.0` with nothing completed.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.completed.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.correct.len() as f64 / self.completed.len() as f64;
        ratio
    }
}

//
// ─── DELTA ─────────────────────────────────────────────────────────────────────
//

/// One answer event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDelta {
    pub question_id: QuestionId,
    pub completed: Vec<QuestionId>,
    pub correct: Vec<QuestionId>,
    pub points: i64,
}

impl ProgressDelta {
    /// Delta produced by answering `question_id`, awarding `points_per_correct`
    /// when the answer was right.
    #[must_use]
    pub fn for_answer(question_id: QuestionId, correct: bool, points_per_correct: i64) -> Self {
        Self {
            question_id,
            completed: vec![question_id],
            correct: if correct { vec![question_id] } else { Vec::new() },
            points: if correct { points_per_correct } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answer_awards_points() {
        let delta = ProgressDelta::for_answer(QuestionId::new(1), true, POINTS_PER_CORRECT);
        assert_eq!(delta.completed, vec![QuestionId::new(1)]);
        assert_eq!(delta.correct, vec![QuestionId::new(1)]);
        assert_eq!(delta.points, 100);
    }

    #[test]
    fn wrong_answer_completes_without_points() {
        let delta = ProgressDelta::for_answer(QuestionId::new(2), false, POINTS_PER_CORRECT);
        assert_eq!(delta.completed, vec![QuestionId::new(2)]);
        assert!(delta.correct.is_empty());
        assert_eq!(delta.points, 0);
    }

    #[test]
    fn accuracy_is_zero_without_progress() {
        assert!(ProgressSnapshot::empty().accuracy().abs() < f64::EPSILON);
    }

    #[test]
    fn delta_uses_camel_case_on_the_wire() {
        let delta = ProgressDelta::for_answer(QuestionId::new(5), true, 100);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["questionId"], 5);
        assert_eq!(json["points"], 100);
    }
}
