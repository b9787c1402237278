use prep_core::model::{Difficulty, ProgressSnapshot, Question, QuestionId};
use sqlx::Row;
use tracing::warn;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

/// Encode an id set as the JSON array stored in progress rows.
pub(crate) fn encode_ids<'a, I>(ids: I) -> Result<String, StorageError>
where
    I: IntoIterator<Item = &'a QuestionId>,
{
    let raw: Vec<u64> = ids.into_iter().map(QuestionId::value).collect();
    serde_json::to_string(&raw).map_err(ser)
}

fn decode_ids(raw: &str) -> Result<Vec<QuestionId>, serde_json::Error> {
    let ids: Vec<u64> = serde_json::from_str(raw)?;
    Ok(ids.into_iter().map(QuestionId::new).collect())
}

/// Map a progress row, reading undecodable id lists as "no progress yet".
pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressSnapshot, StorageError> {
    let completed_raw: Option<String> = row.try_get("completed_questions").map_err(ser)?;
    let correct_raw: Option<String> = row.try_get("correct_questions").map_err(ser)?;
    let points: Option<i64> = row.try_get("points").map_err(ser)?;

    let completed = decode_ids(completed_raw.as_deref().unwrap_or("[]"));
    let correct = decode_ids(correct_raw.as_deref().unwrap_or("[]"));

    match (completed, correct) {
        (Ok(completed), Ok(correct)) => Ok(ProgressSnapshot {
            completed: completed.into_iter().collect(),
            correct: correct.into_iter().collect(),
            points: points.unwrap_or(0),
        }),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "malformed progress row, treating as empty");
            Ok(ProgressSnapshot::empty())
        }
    }
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get("id").map_err(ser)?)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let answer_index = usize::try_from(row.try_get::<i64, _>("answer_index").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("answer_index sign overflow".into()))?;

    Question::new(
        id,
        row.try_get::<String, _>("category").map_err(ser)?,
        row.try_get::<String, _>("topic").map_err(ser)?,
        difficulty,
        row.try_get::<i64, _>("order_index").map_err(ser)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        options,
        answer_index,
        row.try_get::<Option<String>, _>("explanation").map_err(ser)?,
    )
    .map_err(ser)
}
