//! On-disk layout of a managed root
//!
//! The layout manager owns the canonical directory names under the managed
//! root and computes every derived path. The directory tree itself is the
//! persistent state; there are no metadata files.
//!
//! Children of the root:
//!
//! | Name        | Role                                                  |
//! |-------------|-------------------------------------------------------|
//! | `head`      | authoritative current committed tree                  |
//! | `head_old`  | transient: previous head awaiting deletion in a commit|
//! | `wr_snap`   | transient: writable snapshot serving an open write tx |
//! | `ro_snaps`  | container holding read-only snapshot slots            |
//! | `ro_snaps/ro_snap_{i}` | read-only slot, `i` in `[0, max_read_slots)` |

use std::path::{Path, PathBuf};

const HEAD_NAME: &str = "head";
const HEAD_OLD_NAME: &str = "head_old";
const WRITABLE_NAME: &str = "wr_snap";
const READONLY_CONTAINER_NAME: &str = "ro_snaps";
const READONLY_SLOT_PREFIX: &str = "ro_snap_";

/// Default bound on concurrent read transactions.
pub const DEFAULT_MAX_READ_SLOTS: usize = 2;

/// Canonical paths under a managed root.
///
/// Paths are dynamically sized; the OS enforces its own length limits at
/// syscall time.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    head: PathBuf,
    head_old: PathBuf,
    wr_snap: PathBuf,
    ro_snaps: PathBuf,
    max_read_slots: usize,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>, max_read_slots: usize) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            head: root.join(HEAD_NAME),
            head_old: root.join(HEAD_OLD_NAME),
            wr_snap: root.join(WRITABLE_NAME),
            ro_snaps: root.join(READONLY_CONTAINER_NAME),
            root,
            max_read_slots,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The authoritative current committed tree.
    pub fn head(&self) -> &Path {
        &self.head
    }

    /// The previous head, present only inside a commit window or after a
    /// mid-commit crash.
    pub fn head_old(&self) -> &Path {
        &self.head_old
    }

    /// The writable snapshot serving an open write transaction.
    pub fn wr_snap(&self) -> &Path {
        &self.wr_snap
    }

    /// The container subvolume holding read-only snapshot slots.
    pub fn ro_snaps(&self) -> &Path {
        &self.ro_snaps
    }

    pub fn max_read_slots(&self) -> usize {
        self.max_read_slots
    }

    /// Path of read-only slot `index`.
    pub fn ro_slot(&self, index: usize) -> PathBuf {
        self.ro_snaps.join(format!("{}{}", READONLY_SLOT_PREFIX, index))
    }

    /// All candidate slot paths in ascending index order.
    pub fn ro_slot_candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        (0..self.max_read_slots).map(|i| self.ro_slot(i))
    }

    /// First slot whose path does not exist, scanning ascending.
    ///
    /// `None` means every slot is occupied (or leaked by a crashed reader).
    pub fn first_free_slot(&self) -> Option<PathBuf> {
        self.ro_slot_candidates().find(|p| !p.exists())
    }
}
