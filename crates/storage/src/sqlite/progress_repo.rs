use chrono::Utc;
use prep_core::model::{ProgressKey, ProgressSnapshot};

use super::SqliteRepository;
use super::mapping::{encode_ids, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

fn write_error(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn fetch_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT completed_questions, correct_questions, points
            FROM user_progress
            WHERE user_id = ?1 AND topic = ?2 AND area = ?3
            ",
        )
        .bind(key.user_id.as_str())
        .bind(&key.topic)
        .bind(&key.area)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (
                user_id, topic, area, completed_questions, correct_questions, points, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, topic, area) DO UPDATE SET
                completed_questions = excluded.completed_questions,
                correct_questions = excluded.correct_questions,
                points = excluded.points,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.user_id.as_str())
        .bind(&key.topic)
        .bind(&key.area)
        .bind(encode_ids(&snapshot.completed)?)
        .bind(encode_ids(&snapshot.correct)?)
        .bind(snapshot.points)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn insert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (
                user_id, topic, area, completed_questions, correct_questions, points, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(key.user_id.as_str())
        .bind(&key.topic)
        .bind(&key.area)
        .bind(encode_ids(&snapshot.completed)?)
        .bind(encode_ids(&snapshot.correct)?)
        .bind(snapshot.points)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn update_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE user_progress
            SET completed_questions = ?4, correct_questions = ?5, points = ?6, updated_at = ?7
            WHERE user_id = ?1 AND topic = ?2 AND area = ?3
            ",
        )
        .bind(key.user_id.as_str())
        .bind(&key.topic)
        .bind(&key.area)
        .bind(encode_ids(&snapshot.completed)?)
        .bind(encode_ids(&snapshot.correct)?)
        .bind(snapshot.points)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
