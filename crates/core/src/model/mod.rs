mod ids;
mod progress;
mod question;

pub use ids::{ParseIdError, QuestionId, UserId};
pub use progress::{POINTS_PER_CORRECT, ProgressDelta, ProgressKey, ProgressSnapshot};
pub use question::{Difficulty, DifficultyCounts, Question, QuestionError, QuestionPage};
