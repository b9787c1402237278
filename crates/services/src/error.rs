//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors from a progress save cycle or a flushed payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("flush payload is missing a user id")]
    MissingUser,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TopicClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic listing failed: {0}")]
    Api(String),
    #[error("topic listing returned no data")]
    EmptyResponse,
    #[error("topic listing request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
