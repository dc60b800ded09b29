//! Crash point injection for crash-consistency testing
//!
//! When the `BTRFSTXN_CRASH_POINT` environment variable names an enabled
//! point, the process terminates immediately via `std::process::abort()` -
//! no cleanup, no unwinding, no catching. The next initialization must then
//! recover the last committed tree, which is what the crash test suite
//! asserts.
//!
//! # Usage
//!
//! ```ignore
//! use btrfstxn::crash_point::maybe_crash;
//!
//! maybe_crash("commit_after_retire");
//! ```
//!
//! ```bash
//! BTRFSTXN_CRASH_POINT=commit_after_retire btrfstxn write --config btrfstxn.json f
//! ```

use std::sync::OnceLock;

/// Cache the crash point name to avoid repeated env var lookups
static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn configured_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var("BTRFSTXN_CRASH_POINT").ok())
        .as_deref()
}

/// Check if a specific crash point is enabled.
///
/// Zero-cost when `BTRFSTXN_CRASH_POINT` is not set.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    configured_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled.
///
/// No-op when `BTRFSTXN_CRASH_POINT` is unset or names a different point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Write transaction
    pub const WRITE_AFTER_SNAPSHOT: &str = "write_after_snapshot";

    // Commit protocol, in step order
    pub const COMMIT_BEFORE_RETIRE: &str = "commit_before_retire";
    pub const COMMIT_AFTER_RETIRE: &str = "commit_after_retire";
    pub const COMMIT_AFTER_SYNC: &str = "commit_after_sync";
    pub const COMMIT_AFTER_PUBLISH: &str = "commit_after_publish";
    pub const COMMIT_BEFORE_CLEANUP: &str = "commit_before_cleanup";

    // Read transaction
    pub const READ_AFTER_SNAPSHOT: &str = "read_after_snapshot";

    // Recovery
    pub const RECOVERY_BEFORE_RENAME: &str = "recovery_before_rename";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            WRITE_AFTER_SNAPSHOT,
            COMMIT_BEFORE_RETIRE,
            COMMIT_AFTER_RETIRE,
            COMMIT_AFTER_SYNC,
            COMMIT_AFTER_PUBLISH,
            COMMIT_BEFORE_CLEANUP,
            READ_AFTER_SNAPSHOT,
            RECOVERY_BEFORE_RENAME,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_point_disabled_by_default() {
        assert!(!crash_point_enabled("commit_after_retire"));
    }

    #[test]
    fn test_all_crash_points_defined() {
        let all = points::all();
        assert_eq!(all.len(), 8);
        assert!(all.contains(&"commit_after_retire"));
        assert!(all.contains(&"commit_after_publish"));
        assert!(all.contains(&"read_after_snapshot"));
    }

    #[test]
    fn test_crash_point_names_are_lowercase_with_underscores() {
        for point in points::all() {
            assert!(
                point.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "Crash point '{}' should be lowercase with underscores",
                point
            );
        }
    }
}
