//! Error taxonomy shared by the store, the search index and the query engine.

use rusqlite::ErrorCode;

use crate::search::TokenizeError;

pub type Result<T> = std::result::Result<T, GlossaryError>;

#[derive(Debug, thiserror::Error)]
pub enum GlossaryError {
    /// A required field is empty. Raised before any transaction opens.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("term not found: {0}")]
    NotFound(i64),
    /// Uniqueness or foreign-key violation reported by SQLite.
    #[error("constraint violated: {0}")]
    Constraint(rusqlite::Error),
    #[error("storage error: {0}")]
    Storage(rusqlite::Error),
    #[error("no database connection available: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("failed to prepare database folder: {0}")]
    Io(#[from] std::io::Error),
    /// Candidate file that is not valid JSON or reports a suggester failure.
    #[error("invalid candidate file: {0}")]
    Import(String),
    #[error("search index build failed: {0}")]
    IndexBuild(#[from] TokenizeError),
}

impl GlossaryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GlossaryError::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for GlossaryError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => GlossaryError::Constraint(err),
            _ => GlossaryError::Storage(err),
        }
    }
}
