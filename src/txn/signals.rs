//! Termination-signal recording
//!
//! The handler itself only stores the signal number in a process-wide
//! atomic; everything else (aborting or stopping the active transaction,
//! exiting) runs from the main flow via
//! [`TxManager::drive_pending_cleanup`](super::TxManager::drive_pending_cleanup).
//! Hard faults that never return to the main flow are covered by crash
//! recovery at the next initialization.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

/// Signals that trigger transaction cleanup before exit.
pub const TERMINATION_SIGNALS: &[libc::c_int] = &[
    libc::SIGABRT,
    libc::SIGFPE,
    libc::SIGILL,
    libc::SIGINT,
    libc::SIGSEGV,
    libc::SIGTERM,
];

static PENDING: AtomicI32 = AtomicI32::new(0);
static INSTALL: Once = Once::new();

extern "C" fn record_signal(signum: libc::c_int) {
    // Async-signal-safe: a single atomic store, nothing else.
    PENDING.store(signum, Ordering::SeqCst);
}

/// Install the recording handler for every termination signal. Idempotent.
pub fn install() {
    INSTALL.call_once(|| {
        let handler = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for &signum in TERMINATION_SIGNALS {
            unsafe {
                libc::signal(signum, handler);
            }
        }
    });
}

/// The most recently recorded termination signal, if any.
pub fn pending() -> Option<i32> {
    match PENDING.load(Ordering::SeqCst) {
        0 => None,
        signum => Some(signum),
    }
}

/// Forget the recorded signal (after cleanup has run).
pub fn clear() {
    PENDING.store(0, Ordering::SeqCst);
}
