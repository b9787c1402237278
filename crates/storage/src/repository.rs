use async_trait::async_trait;
use prep_core::model::{
    Difficulty, DifficultyCounts, ProgressKey, ProgressSnapshot, Question, QuestionId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Remote progress rows, unique on `(user_id, topic, area)`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored snapshot for a key.
    ///
    /// Returns `Ok(None)` when no row exists yet. Rows whose id lists cannot be
    /// decoded are read as empty progress rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn fetch_progress(&self, key: &ProgressKey)
    -> Result<Option<ProgressSnapshot>, StorageError>;

    /// Insert or overwrite the row on its unique key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError>;

    /// Plain insert.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a row for the key already exists.
    async fn insert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError>;

    /// Targeted update of an existing row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if there is no row for the key.
    async fn update_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError>;
}

/// Read access to the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Count questions per difficulty for a category/topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_by_difficulty(
        &self,
        category: &str,
        topic: &str,
    ) -> Result<DifficultyCounts, StorageError>;

    /// Fetch a page of questions ordered by their explicit order field, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn question_page(
        &self,
        category: &str,
        topic: &str,
        difficulty: Option<Difficulty>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Insert or replace a question (used by seeding and ingestion).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<ProgressKey, ProgressSnapshot>>>,
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn fetch_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressSnapshot>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn upsert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert(key.clone(), snapshot.clone());
        Ok(())
    }

    async fn insert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        if guard.contains_key(key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key.clone(), snapshot.clone());
        Ok(())
    }

    async fn update_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let row = guard.get_mut(key).ok_or(StorageError::NotFound)?;
        *row = snapshot.clone();
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn count_by_difficulty(
        &self,
        category: &str,
        topic: &str,
    ) -> Result<DifficultyCounts, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut counts = DifficultyCounts::default();
        for q in guard
            .values()
            .filter(|q| q.category() == category && q.topic() == topic)
        {
            counts.add(q.difficulty(), 1);
        }
        Ok(counts)
    }

    async fn question_page(
        &self,
        category: &str,
        topic: &str,
        difficulty: Option<Difficulty>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut matching: Vec<Question> = guard
            .values()
            .filter(|q| q.category() == category && q.topic() == topic)
            .filter(|q| difficulty.is_none_or(|d| q.difficulty() == d))
            .cloned()
            .collect();
        matching.sort_by_key(|q| (q.order(), q.id()));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo);
        Self {
            progress,
            questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::UserId;

    fn key() -> ProgressKey {
        ProgressKey::new(UserId::new("user_1"), "polity", "ssc")
    }

    fn snapshot(points: i64) -> ProgressSnapshot {
        let mut snap = ProgressSnapshot::empty();
        snap.completed.insert(QuestionId::new(1));
        snap.points = points;
        snap
    }

    fn question(id: u64, order: i64, difficulty: Difficulty) -> Question {
        Question::new(
            QuestionId::new(id),
            "ssc",
            "polity",
            difficulty,
            order,
            format!("Q{id}"),
            vec!["A".into(), "B".into()],
            0,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_conflicts_when_row_exists() {
        let repo = InMemoryRepository::new();
        repo.insert_progress(&key(), &snapshot(1)).await.unwrap();
        let err = repo.insert_progress(&key(), &snapshot(2)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let repo = InMemoryRepository::new();
        let err = repo.update_progress(&key(), &snapshot(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.upsert_progress(&key(), &snapshot(1)).await.unwrap();
        repo.update_progress(&key(), &snapshot(5)).await.unwrap();
        let stored = repo.fetch_progress(&key()).await.unwrap().unwrap();
        assert_eq!(stored.points, 5);
    }

    #[tokio::test]
    async fn missing_progress_is_none() {
        let repo = InMemoryRepository::new();
        assert!(repo.fetch_progress(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pages_follow_order_field() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&question(1, 30, Difficulty::Easy)).await.unwrap();
        repo.upsert_question(&question(2, 10, Difficulty::Easy)).await.unwrap();
        repo.upsert_question(&question(3, 20, Difficulty::Hard)).await.unwrap();

        let all = repo.question_page("ssc", "polity", None, 0, 10).await.unwrap();
        let ids: Vec<u64> = all.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let easy = repo
            .question_page("ssc", "polity", Some(Difficulty::Easy), 1, 10)
            .await
            .unwrap();
        assert_eq!(easy.len(), 1);
        assert_eq!(easy[0].id(), QuestionId::new(1));

        let counts = repo.count_by_difficulty("ssc", "polity").await.unwrap();
        assert_eq!(counts.easy, 2);
        assert_eq!(counts.hard, 1);
    }
}
