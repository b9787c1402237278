use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question has no options")]
    NoOptions,
    #[error("answer index {index} out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// A multiple-choice practice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    category: String,
    topic: String,
    difficulty: Difficulty,
    order: i64,
    prompt: String,
    options: Vec<String>,
    answer_index: usize,
    explanation: Option<String>,
}

impl Question {
    /// Build a question, validating the answer index against its options.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if there are no options or the answer index is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: QuestionId,
        category: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        order: i64,
        prompt: impl Into<String>,
        options: Vec<String>,
        answer_index: usize,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        if answer_index >= options.len() {
            return Err(QuestionError::AnswerOutOfRange {
                index: answer_index,
                options: options.len(),
            });
        }
        Ok(Self {
            id,
            category: category.into(),
            topic: topic.into(),
            difficulty,
            order,
            prompt: prompt.into(),
            options,
            answer_index,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn order(&self) -> i64 {
        self.order
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn answer_index(&self) -> usize {
        self.answer_index
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.answer_index
    }
}

/// One page of questions plus paging totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPage {
    pub questions: Vec<Question>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl QuestionPage {
    #[must_use]
    pub fn empty(page: u32) -> Self {
        Self {
            questions: Vec::new(),
            page,
            total_pages: 0,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyCounts {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl DifficultyCounts {
    #[must_use]
    pub fn get(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn add(&mut self, difficulty: Difficulty, n: u64) {
        match difficulty {
            Difficulty::Easy => self.easy += n,
            Difficulty::Medium => self.medium += n,
            Difficulty::Hard => self.hard += n,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.easy + self.medium + self.hard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into(), "D".into()]
    }

    #[test]
    fn rejects_answer_out_of_range() {
        let err = Question::new(
            QuestionId::new(1),
            "ssc",
            "polity",
            Difficulty::Easy,
            1,
            "Q",
            options(),
            4,
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::AnswerOutOfRange { index: 4, options: 4 });
    }

    #[test]
    fn rejects_empty_options() {
        let err = Question::new(
            QuestionId::new(1),
            "ssc",
            "polity",
            Difficulty::Easy,
            1,
            "Q",
            Vec::new(),
            0,
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::NoOptions);
    }

    #[test]
    fn checks_choice() {
        let q = Question::new(
            QuestionId::new(1),
            "ssc",
            "polity",
            Difficulty::Medium,
            1,
            "Q",
            options(),
            2,
            Some("because".into()),
        )
        .unwrap();
        assert!(q.is_correct(2));
        assert!(!q.is_correct(0));
        assert_eq!(q.explanation(), Some("because"));
    }

    #[test]
    fn parses_difficulty_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn counts_total() {
        let mut counts = DifficultyCounts::default();
        counts.add(Difficulty::Easy, 3);
        counts.add(Difficulty::Hard, 2);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.get(Difficulty::Medium), 0);
    }
}
