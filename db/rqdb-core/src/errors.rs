///
/// Database layer error types.
///
/// Statement-level failures are carried as `DbError::Statement` only until
/// they are folded into the `error` field of a result entry. Everything else
/// is returned to the caller as a batch-level failure.
///

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to open database '{locator}': {reason}")]
    Open { locator: String, reason: String },

    #[error("Constraint setting rejected: {0}")]
    Config(String),

    #[error("{0}")]
    Statement(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Backup to '{path}' failed: {reason}")]
    Backup { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub(crate) fn statement(e: rusqlite::Error) -> Self {
        let message = e.to_string();
        if message.is_empty() {
            DbError::Statement("statement failed".to_string())
        } else {
            DbError::Statement(message)
        }
    }

    pub(crate) fn engine(e: impl std::fmt::Display) -> Self {
        DbError::Engine(e.to_string())
    }

    pub(crate) fn closed() -> Self {
        DbError::Engine("database is closed".to_string())
    }

    /// Message stored in a result entry's `error` field.
    pub(crate) fn into_message(self) -> String {
        match self {
            DbError::Statement(message) => message,
            other => other.to_string(),
        }
    }
}
