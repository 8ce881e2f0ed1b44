//! Error types for the record store
//!
//! `StorageError` covers the durable snapshot slot, `StoreError` is what the
//! presentation layer sees from a store operation.

use thiserror::Error;

/// Failure reading or writing the persisted snapshot
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("snapshot could not be encoded or decoded: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine the user data directory")]
    NoDataDir,

    #[error("snapshot slot unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or a value is out of range
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The operation referenced an id the store does not hold
    #[error("no record with id {id}")]
    NotFound { id: String },

    /// The in-memory change was applied but the snapshot could not be saved
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure parsing a user-facing filter or status label
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown status label: {0:?}")]
    Status(String),

    #[error("unknown rating filter: {0:?}")]
    Rating(String),

    #[error("unknown sort key: {0:?}")]
    SortKey(String),
}
