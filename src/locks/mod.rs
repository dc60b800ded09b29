//! Cross-process mutual exclusion
//!
//! Three named counting semaphores guard a managed root:
//!
//! | Lock          | Initial count | Purpose                                    |
//! |---------------|---------------|--------------------------------------------|
//! | write lock    | 1             | at most one write tx across all processes  |
//! | read slots    | N             | bounds concurrent read txs                 |
//! | rename window | 1             | serializes the commit swap against read-tx |
//! |               |               | snapshot creation                          |
//!
//! Names are derived from the canonicalized root path so that every process
//! sharing a root agrees on them and distinct roots never contend.

pub mod errors;
mod semaphore;

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub use errors::{LockError, LockResult};
pub use semaphore::NamedSemaphore;

/// Factory for the three semaphores guarding one managed root.
#[derive(Debug, Clone)]
pub struct LockManager {
    write_name: String,
    read_name: String,
    rename_name: String,
    read_slots: u32,
}

impl LockManager {
    /// `root` must already be canonicalized so that all processes sharing
    /// the managed root derive identical names.
    pub fn new(root: &Path, read_slots: usize) -> Self {
        let tag = crc32fast::hash(root.as_os_str().as_bytes());
        Self {
            write_name: format!("/btrfstxn-{:08x}-write", tag),
            read_name: format!("/btrfstxn-{:08x}-read", tag),
            rename_name: format!("/btrfstxn-{:08x}-rename", tag),
            read_slots: read_slots as u32,
        }
    }

    /// Open the exclusive writer-admission semaphore.
    pub fn write_lock(&self) -> LockResult<NamedSemaphore> {
        NamedSemaphore::open(&self.write_name, 1)
    }

    /// Open the bounded read-slot semaphore.
    pub fn read_slots(&self) -> LockResult<NamedSemaphore> {
        NamedSemaphore::open(&self.read_name, self.read_slots)
    }

    /// Open the rename-window semaphore.
    pub fn rename_window(&self) -> LockResult<NamedSemaphore> {
        NamedSemaphore::open(&self.rename_name, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_names_are_stable_per_root() {
        let a = LockManager::new(Path::new("/mnt/vol"), 2);
        let b = LockManager::new(Path::new("/mnt/vol"), 2);
        assert_eq!(a.write_name, b.write_name);
        assert_eq!(a.read_name, b.read_name);
        assert_eq!(a.rename_name, b.rename_name);
    }

    #[test]
    fn test_distinct_roots_get_distinct_names() {
        let a = LockManager::new(Path::new("/mnt/vol-a"), 2);
        let b = LockManager::new(Path::new("/mnt/vol-b"), 2);
        assert_ne!(a.write_name, b.write_name);
    }

    #[test]
    fn test_three_locks_are_distinct() {
        let locks = LockManager::new(Path::new("/mnt/vol"), 2);
        assert_ne!(locks.write_name, locks.read_name);
        assert_ne!(locks.read_name, locks.rename_name);
        assert_ne!(locks.write_name, locks.rename_name);
    }

    #[test]
    fn test_write_lock_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let locks = LockManager::new(tmp.path(), 2);

        let held = locks.write_lock().unwrap();
        held.wait().unwrap();

        let contender = locks.write_lock().unwrap();
        assert!(!contender.try_wait().unwrap());

        held.post().unwrap();
        assert!(contender.try_wait().unwrap());
        contender.post().unwrap();
    }

    #[test]
    fn test_read_slots_bounded() {
        let tmp = TempDir::new().unwrap();
        let locks = LockManager::new(tmp.path(), 2);

        let a = locks.read_slots().unwrap();
        let b = locks.read_slots().unwrap();
        let c = locks.read_slots().unwrap();
        assert!(a.try_wait().unwrap());
        assert!(b.try_wait().unwrap());
        assert!(!c.try_wait().unwrap());

        a.post().unwrap();
        b.post().unwrap();
    }
}
