//! Observability for btrfstxn
//!
//! Structured JSON logging with deterministic key ordering, plus the typed
//! event vocabulary of the transaction lifecycle.
//!
//! # Principles
//!
//! 1. Observability is read-only; no side effects on the transaction protocol
//! 2. Synchronous, no background threads
//! 3. One log line = one event
//! 4. Deterministic output (fields sorted alphabetically)

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event with no extra fields.
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

/// Emit the single diagnostic line required on every failing path:
/// the operation, the affected path, and the underlying cause.
pub fn log_failure(operation: &str, path: &str, cause: &str) {
    Logger::log_stderr(
        Severity::Error,
        "OPERATION_FAILED",
        &[("cause", cause), ("operation", operation), ("path", path)],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::InitStart);
        log_event(Event::InitComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::CommitPublished, &[("root", "/mnt/btrfs")]);
    }

    #[test]
    fn test_log_failure() {
        log_failure("commit", "/mnt/btrfs/head", "rename failed");
    }
}
