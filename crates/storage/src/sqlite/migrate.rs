use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations that have not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: question bank and per-user progress.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    category TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
                    order_index INTEGER NOT NULL,
                    prompt TEXT NOT NULL,
                    options TEXT NOT NULL,
                    answer_index INTEGER NOT NULL CHECK (answer_index >= 0),
                    explanation TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_listing
                ON questions (category, topic, difficulty, order_index, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_progress (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    area TEXT NOT NULL,
                    completed_questions TEXT NOT NULL DEFAULT '[]',
                    correct_questions TEXT NOT NULL DEFAULT '[]',
                    points INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, topic, area)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
