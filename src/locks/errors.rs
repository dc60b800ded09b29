//! Lock manager error types

use std::io;

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Errors from the cross-process semaphore layer
#[derive(Debug, Error)]
pub enum LockError {
    /// `sem_open` failed
    #[error("cannot open semaphore '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    /// `sem_wait` failed
    #[error("cannot acquire semaphore '{name}': {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A blocking acquisition was interrupted by a recorded termination signal
    #[error("acquisition of semaphore '{name}' interrupted by signal")]
    Interrupted { name: String },

    /// `sem_post` failed
    #[error("cannot release semaphore '{name}': {source}")]
    Post {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The semaphore name cannot be represented as a C string
    #[error("invalid semaphore name '{0}'")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_semaphore() {
        let err = LockError::Wait {
            name: "/btrfstxn-0-write".to_string(),
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/btrfstxn-0-write"));
        assert!(msg.contains("boom"));
    }
}
