//! Error types for the store, the cache layer and configuration loading.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Failures surfaced by repositories and the read path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid input: {0}")]
    Validation(String),

    /// A unique or foreign-key constraint rejected the write.
    #[error("conflicting record: {0}")]
    Conflict(String),

    #[error("locale {code} cannot be deleted while it is {reason}")]
    LocaleProtected { code: String, reason: &'static str },

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// Only raised when a cache backend cannot be opened at all.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.clone().unwrap_or_else(|| code.to_string()))
            }
            other => StoreError::Database(other),
        }
    }
}

/// Failures of a cache backend. Callers treat these as best-effort.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("failed to encode cache payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
