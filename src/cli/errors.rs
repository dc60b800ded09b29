//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::txn::TxError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by the thin client commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file missing, unreadable, or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// stdin/stdout failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding failure on the output path
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A transaction operation failed
    #[error(transparent)]
    Transaction(#[from] TxError),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Error code string for the JSON error line
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Transaction(e) => match e {
                TxError::Access { .. } => "ACCESS",
                TxError::NotASubvolume(_) => "NOT_A_SUBVOLUME",
                TxError::ExistsAndNotADir(_) => "EXISTS_AND_NOT_A_DIR",
                TxError::IncorrectName(_) => "INCORRECT_NAME",
                TxError::NameTooLong(_) => "NAME_TOO_LONG",
                TxError::InvalidName(_) => "INVALID_NAME",
                TxError::Rename { .. } => "RENAME",
                TxError::Delete { .. } => "DELETE",
                TxError::WrongState(_) => "WRONG_STATE",
                TxError::Corrupt(_) => "CORRUPT",
                TxError::Unspecified(_) => "UNSPECIFIED",
            },
        }
    }
}
