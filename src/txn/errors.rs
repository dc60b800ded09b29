//! Public error taxonomy of the transaction manager

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::locks::LockError;
use crate::state::WrongState;
use crate::volume::VolumeError;

/// Result type for transaction operations
pub type TxResult<T> = Result<T, TxError>;

/// Errors surfaced by the transaction API
#[derive(Debug, Error)]
pub enum TxError {
    /// A needed path could not be opened or stat'ed
    #[error("cannot access '{path}': {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A path exists but is not a subvolume where one is required
    #[error("'{0}' is not a subvolume")]
    NotASubvolume(PathBuf),

    /// A destination collides with a non-directory
    #[error("'{0}' exists and is not a directory")]
    ExistsAndNotADir(PathBuf),

    /// A subvolume or snapshot name failed validation
    #[error("incorrect subvolume name ('{0}')")]
    IncorrectName(String),

    /// A subvolume or snapshot name exceeds the volume-name maximum
    #[error("subvolume name too long ('{0}')")]
    NameTooLong(String),

    /// A filename passed to the redirection facade is rejected
    #[error("invalid filename '{0}'")]
    InvalidName(String),

    /// A rename failed; the commit (or recovery) cannot proceed atomically
    #[error("renaming '{from}' to '{to}' failed: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Subvolume deletion failed
    #[error("cannot delete subvolume '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation attempted from a state that does not permit it
    #[error(transparent)]
    WrongState(#[from] WrongState),

    /// The on-disk layout does not satisfy the init invariants
    #[error("managed root '{0}' has a corrupt layout")]
    Corrupt(PathBuf),

    /// Residual catch-all (e.g. no free read slot)
    #[error("{0}")]
    Unspecified(String),
}

impl From<VolumeError> for TxError {
    fn from(e: VolumeError) -> Self {
        match e {
            VolumeError::Access { path, source } => TxError::Access { path, source },
            VolumeError::NotASubvolume(path) => TxError::NotASubvolume(path),
            VolumeError::ExistsAndNotADir(path) => TxError::ExistsAndNotADir(path),
            VolumeError::IncorrectName(name) => TxError::IncorrectName(name),
            VolumeError::NameTooLong(name) => TxError::NameTooLong(name),
            VolumeError::Delete { path, source } => TxError::Delete { path, source },
            other @ (VolumeError::AlreadyExists(_)
            | VolumeError::NotBtrfs(_)
            | VolumeError::Io { .. }) => TxError::Unspecified(other.to_string()),
        }
    }
}

impl From<LockError> for TxError {
    fn from(e: LockError) -> Self {
        TxError::Unspecified(e.to_string())
    }
}
