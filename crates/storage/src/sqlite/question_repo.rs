use prep_core::model::{Difficulty, DifficultyCounts, Question};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{map_question_row, question_id_to_i64};
use crate::repository::{QuestionRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn count_by_difficulty(
        &self,
        category: &str,
        topic: &str,
    ) -> Result<DifficultyCounts, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT difficulty, COUNT(*) AS n
            FROM questions
            WHERE category = ?1 AND topic = ?2
            GROUP BY difficulty
            ",
        )
        .bind(category)
        .bind(topic)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut counts = DifficultyCounts::default();
        for row in rows {
            let difficulty: Difficulty = row
                .try_get::<String, _>("difficulty")
                .map_err(|e| StorageError::Serialization(e.to_string()))?
                .parse()
                .map_err(|e: prep_core::model::QuestionError| {
                    StorageError::Serialization(e.to_string())
                })?;
            let n: i64 = row
                .try_get("n")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            counts.add(difficulty, u64::try_from(n).unwrap_or(0));
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
        let offset = i64::try_from(offset)
            .map_err(|_| StorageError::Serialization("offset overflow".into()))?;

        let rows = sqlx::query(
            r"
            SELECT id, category, topic, difficulty, order_index, prompt, options,
                   answer_index, explanation
            FROM questions
            WHERE category = ?1 AND topic = ?2 AND (?3 IS NULL OR difficulty = ?3)
            ORDER BY order_index ASC, id ASC
            LIMIT ?4 OFFSET ?5
            ",
        )
        .bind(category)
        .bind(topic)
        .bind(difficulty.map(Difficulty::as_str))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let options = serde_json::to_string(question.options())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let answer_index = i64::try_from(question.answer_index())
            .map_err(|_| StorageError::Serialization("answer_index overflow".into()))?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, category, topic, difficulty, order_index, prompt, options,
                answer_index, explanation
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                topic = excluded.topic,
                difficulty = excluded.difficulty,
                order_index = excluded.order_index,
                prompt = excluded.prompt,
                options = excluded.options,
                answer_index = excluded.answer_index,
                explanation = excluded.explanation
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(question.category())
        .bind(question.topic())
        .bind(question.difficulty().as_str())
        .bind(question.order())
        .bind(question.prompt())
        .bind(options)
        .bind(answer_index)
        .bind(question.explanation())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
