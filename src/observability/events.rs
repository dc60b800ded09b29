//! Observable events of the transaction lifecycle
//!
//! Events are explicit and typed; the string form is what appears in the
//! structured log line.

use super::Severity;

/// Observable events in btrfstxn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Initialization & recovery
    /// Initialization begins
    InitStart,
    /// Fresh managed root: head and the read-snapshot container were created
    InitFresh,
    /// Mid-commit crash state repaired (head_old renamed back to head)
    InitRecovered,
    /// Leftover writable snapshot from a crashed write tx was deleted
    InitStaleWriteSnapshotDeleted,
    /// Initialization complete, manager is usable
    InitComplete,
    /// On-disk layout did not match any recognized state
    InitCorrupt,

    // Write transactions
    /// Write transaction started (writable snapshot created)
    WriteStart,
    /// Commit protocol entered
    CommitStart,
    /// New tree published (second rename of the swap succeeded)
    CommitPublished,
    /// Commit complete (previous head deleted, write lock released)
    CommitComplete,
    /// Write transaction aborted (writable snapshot discarded)
    AbortComplete,

    // Read transactions
    /// Read transaction started (read-only slot snapshot created)
    ReadStart,
    /// Read transaction stopped (slot snapshot deleted)
    ReadStop,

    // Signals
    /// A termination signal was recorded
    SignalCaught,
    /// Signal-driven cleanup ran (abort or stop-read)
    SignalCleanup,
}

impl Event {
    /// String form used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::InitStart => "INIT_START",
            Event::InitFresh => "INIT_FRESH",
            Event::InitRecovered => "INIT_RECOVERED",
            Event::InitStaleWriteSnapshotDeleted => "INIT_STALE_WR_SNAP_DELETED",
            Event::InitComplete => "INIT_COMPLETE",
            Event::InitCorrupt => "INIT_CORRUPT",
            Event::WriteStart => "TX_WRITE_START",
            Event::CommitStart => "TX_COMMIT_START",
            Event::CommitPublished => "TX_COMMIT_PUBLISHED",
            Event::CommitComplete => "TX_COMMIT_COMPLETE",
            Event::AbortComplete => "TX_ABORT_COMPLETE",
            Event::ReadStart => "TX_READ_START",
            Event::ReadStop => "TX_READ_STOP",
            Event::SignalCaught => "SIGNAL_CAUGHT",
            Event::SignalCleanup => "SIGNAL_CLEANUP",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::InitRecovered
            | Event::InitStaleWriteSnapshotDeleted
            | Event::SignalCaught
            | Event::SignalCleanup => Severity::Warn,
            Event::InitCorrupt => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
