/// Sweetsql Error Module
///
/// This module defines the error type shared by every sweetsql operation.
/// Errors are never retried or recovered internally; each variant propagates
/// straight back to the caller.
use crate::core::db::error::DatabaseError;
use thiserror::Error;

/// Error type for the sweetsql library.
///
/// Callers are expected to handle:
/// - `Connection` around connection establishment and use of a closed connection
/// - `Database` around data operations
///
/// `Usage` and `FieldAccess` indicate a bug in the calling code.
#[derive(Error, Debug)]
pub enum SweetError {
    /// The driver session could not be established or is no longer usable
    #[error("Connection error: {0}")]
    Connection(String),

    /// A prepare, execute or fetch failure reported by the driver
    #[error(transparent)]
    Database(#[from] Box<DatabaseError>),

    /// Argument conventions were misused by the caller
    #[error("Usage error: {0}")]
    Usage(String),

    /// A result row was asked for a field it does not have
    #[error("Attempt to read nonexistent recordset field: {0}")]
    FieldAccess(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DatabaseError> for SweetError {
    fn from(err: DatabaseError) -> Self {
        SweetError::Database(Box::new(err))
    }
}

/// Type alias for Result to use SweetError as the error type.
pub type Result<T> = std::result::Result<T, SweetError>;
