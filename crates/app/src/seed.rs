use prep_core::model::{Difficulty, Question, QuestionId};
use storage::repository::{QuestionRepository, StorageError};

struct SeedQuestion {
    id: u64,
    area: &'static str,
    topic: &'static str,
    difficulty: Difficulty,
    prompt: &'static str,
    options: [&'static str; 4],
    answer: usize,
    explanation: Option<&'static str>,
}

const BANK: &[SeedQuestion] = &[
    SeedQuestion {
        id: 1,
        area: "ssc",
        topic: "polity",
        difficulty: Difficulty::Easy,
        prompt: "Which article of the Constitution abolishes untouchability?",
        options: ["Article 14", "Article 17", "Article 21", "Article 32"],
        answer: 1,
        explanation: Some("Article 17 abolishes untouchability and forbids its practice."),
    },
    SeedQuestion {
        id: 2,
        area: "ssc",
        topic: "polity",
        difficulty: Difficulty::Easy,
        prompt: "Who is the ex-officio Chairman of the Rajya Sabha?",
        options: ["President", "Prime Minister", "Vice-President", "Speaker"],
        answer: 2,
        explanation: None,
    },
    SeedQuestion {
        id: 3,
        area: "ssc",
        topic: "polity",
        difficulty: Difficulty::Medium,
        prompt: "The concept of Directive Principles was borrowed from which constitution?",
        options: ["USA", "Ireland", "Canada", "Australia"],
        answer: 1,
        explanation: Some("Directive Principles were adapted from the Irish Constitution."),
    },
    SeedQuestion {
        id: 4,
        area: "ssc",
        topic: "polity",
        difficulty: Difficulty::Hard,
        prompt: "Which schedule of the Constitution deals with anti-defection?",
        options: ["Eighth", "Ninth", "Tenth", "Eleventh"],
        answer: 2,
        explanation: None,
    },
    SeedQuestion {
        id: 5,
        area: "ssc",
        topic: "history",
        difficulty: Difficulty::Easy,
        prompt: "In which year was the Indian National Congress founded?",
        options: ["1857", "1885", "1905", "1919"],
        answer: 1,
        explanation: Some("The first session was held in Bombay in December 1885."),
    },
    SeedQuestion {
        id: 6,
        area: "upsc",
        topic: "geography",
        difficulty: Difficulty::Medium,
        prompt: "Which is the longest river flowing entirely within India?",
        options: ["Godavari", "Krishna", "Narmada", "Mahanadi"],
        answer: 0,
        explanation: None,
    },
];

/// Upsert the sample question bank. Returns the number of questions written.
pub async fn seed_questions(repo: &dyn QuestionRepository) -> Result<usize, StorageError> {
    for (order, seed) in BANK.iter().enumerate() {
        let question = Question::new(
            QuestionId::new(seed.id),
            seed.area,
            seed.topic,
            seed.difficulty,
            i64::try_from(order).unwrap_or(i64::MAX),
            seed.prompt,
            seed.options.iter().map(|o| (*o).to_string()).collect(),
            seed.answer,
            seed.explanation.map(str::to_string),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        repo.upsert_question(&question).await?;
    }
    Ok(BANK.len())
}
