//! Volume adapter error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for volume operations
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors from the subvolume adapter
#[derive(Debug, Error)]
pub enum VolumeError {
    /// A needed path could not be opened or stat'ed
    #[error("cannot access '{path}': {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path exists but is not a subvolume where one is required
    #[error("'{0}' is not a subvolume")]
    NotASubvolume(PathBuf),

    /// The destination exists but is not a directory
    #[error("'{0}' exists and is not a directory")]
    ExistsAndNotADir(PathBuf),

    /// The destination already exists
    #[error("'{0}' already exists")]
    AlreadyExists(PathBuf),

    /// The parent filesystem is not btrfs
    #[error("'{0}' is not on a btrfs filesystem")]
    NotBtrfs(PathBuf),

    /// The subvolume or snapshot name is empty, '.', '..', or contains '/'
    #[error("incorrect subvolume name ('{0}')")]
    IncorrectName(String),

    /// The subvolume or snapshot name exceeds the volume-name maximum
    #[error("subvolume name too long ('{0}')")]
    NameTooLong(String),

    /// Subvolume deletion failed
    #[error("cannot delete subvolume '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An underlying create or snapshot operation failed
    #[error("{operation} failed for '{path}': {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VolumeError {
    pub(crate) fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Access {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_path() {
        let err = VolumeError::NotASubvolume(PathBuf::from("/mnt/x/head"));
        assert!(err.to_string().contains("/mnt/x/head"));

        let err = VolumeError::access(
            "/mnt/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/mnt/x"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_delete_keeps_source() {
        let err = VolumeError::Delete {
            path: PathBuf::from("/mnt/x/head_old"),
            source: io::Error::new(io::ErrorKind::Other, "busy"),
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
