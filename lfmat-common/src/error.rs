//! Common error types for lfmat

use thiserror::Error;

/// Common result type for lfmat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across lfmat crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error, including malformed LF lists
    #[error("Configuration error: {0}")]
    Config(String),

    /// A labeling function returned a value outside its candidate's vocabulary
    #[error("Can't parse label value {value:?} for candidate values {vocabulary:?}")]
    Encoding {
        value: String,
        vocabulary: Vec<String>,
    },

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLite lock contention (`SQLITE_BUSY` / `SQLITE_LOCKED` and their
    /// extended codes), which callers retry rather than surface.
    pub fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                let busy_code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| matches!(code & 0xff, 5 | 6))
                    .unwrap_or(false);
                busy_code || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}
