use thiserror::Error;

pub type Result<T> = std::result::Result<T, TierError>;

#[derive(Debug, Error)]
pub enum TierError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored data is malformed: {0}")]
    Corrupt(String),
}

impl TierError {
    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{} {}", what, id))
    }
}

impl From<serde_json::Error> for TierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

// SQLite reports unique-constraint violations as database errors; surface them as conflicts
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> TierError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            TierError::Conflict(format!("{} already exists", what))
        }
        _ => TierError::Database(err),
    }
}
