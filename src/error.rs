use thiserror::Error;

use crate::record::Rejection;

#[derive(Error, Debug)]
pub enum RepeciError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Validation error: {0}")]
    Validation(Rejection),
    #[error("Decode error in {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepeciError {
    /// Errors after which no further unit of work can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Lock(_) | Self::Invariant(_))
    }
}

pub type Result<T> = std::result::Result<T, RepeciError>;

// Helper conversions
impl From<rusqlite::Error> for RepeciError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &e {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::ReadOnly
                | ErrorCode::DiskFull
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::OutOfMemory => Self::Unavailable(e.to_string()),
                _ => Self::Persistence(e.to_string()),
            },
            _ => Self::Persistence(e.to_string()),
        }
    }
}

impl From<Rejection> for RepeciError {
    fn from(rejection: Rejection) -> Self {
        Self::Validation(rejection)
    }
}

impl From<config::ConfigError> for RepeciError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RepeciError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}
