use survey_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Original note not found: {0}")]
    NotFound(String),
    #[error("Cannot {action} non-active record: {id}")]
    NotActive { action: &'static str, id: String },
    #[error("{0}")]
    InvalidInput(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;
