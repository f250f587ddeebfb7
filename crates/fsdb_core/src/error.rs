//! Error types for fsdb core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in fsdb core operations.
///
/// Nothing here is fatal: every error leaves the connection usable, and
/// the caller may retry, fix the input, or roll back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Table file encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] fsdb_codec::CodecError),

    /// File read, write, stat, or remove failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A table with this name is already registered or has a file.
    #[error("cannot create table '{name}': already exists")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// No table with this name is registered or on disk.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// A freshly assigned record ID is already taken.
    #[error("cannot insert into '{table}': duplicate record ID {id}")]
    DuplicateRecordId {
        /// Name of the table.
        table: String,
        /// The colliding ID.
        id: String,
    },

    /// A transaction is already open on this connection.
    #[error("a transaction is already open on this connection")]
    TransactionActive,

    /// Record passed to insert or update is missing or malformed.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// Statement text or structured request could not be understood.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// Table name cannot be mapped to a file in the connection directory.
    #[error("invalid table name: {name:?}")]
    InvalidTableName {
        /// The rejected name.
        name: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a table exists error.
    pub fn table_exists(name: impl Into<String>) -> Self {
        Self::TableExists { name: name.into() }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors that report a name or ID collision.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::TableExists { .. } | Self::DuplicateRecordId { .. } | Self::TransactionActive
        )
    }
}
