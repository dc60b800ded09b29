//! Path-redirection facade
//!
//! File operations accepting a relative name, rewritten into the active
//! transaction's tree: the allocated read-only slot in a read transaction,
//! the writable snapshot in a write transaction. Any other state refuses
//! with `WrongState`; the names `"."`, `".."`, `"/"` and the empty name are
//! refused with `InvalidName`.
//!
//! The rewritten path is delegated to `std::fs`; dropping a returned
//! `File` closes it. Failures of the delegated operation are reported as
//! `Access` with the underlying error attached.
//! Absolute-looking names are made relative before joining, so a resolved
//! path always stays inside the transaction's tree; path traversal through
//! `..` components is outside the facade's guarantees.

use std::fs::{File, Metadata, OpenOptions};
use std::path::PathBuf;

use crate::observability::log_failure;
use crate::state::WrongState;
use crate::volume::VolumeOps;

use super::errors::{TxError, TxResult};
use super::manager::TxManager;

impl<V: VolumeOps> TxManager<V> {
    /// Rewrite a client-supplied relative name into the active
    /// transaction's tree.
    pub fn resolve(&self, name: &str) -> TxResult<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name == "/" {
            let err = TxError::InvalidName(name.to_string());
            log_failure("resolve", name, &err.to_string());
            return Err(err);
        }
        let base = self.redirect_base().ok_or(TxError::WrongState(WrongState {
            current: self.state(),
            required: "write or read",
        }))?;
        Ok(base.join(name.trim_start_matches('/')))
    }

    /// Open a file with caller-supplied options.
    pub fn open_with(&self, name: &str, options: &OpenOptions) -> TxResult<File> {
        let path = self.resolve(name)?;
        options.open(&path).map_err(|e| TxError::Access {
            path,
            source: e,
        })
    }

    /// Open an existing file for reading.
    pub fn open(&self, name: &str) -> TxResult<File> {
        self.open_with(name, OpenOptions::new().read(true))
    }

    /// Create (or truncate) a file for writing.
    pub fn create(&self, name: &str) -> TxResult<File> {
        self.open_with(name, OpenOptions::new().write(true).create(true).truncate(true))
    }

    /// Create a directory.
    pub fn mkdir(&self, name: &str) -> TxResult<()> {
        let path = self.resolve(name)?;
        std::fs::create_dir(&path).map_err(|e| TxError::Access { path, source: e })
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, name: &str) -> TxResult<()> {
        let path = self.resolve(name)?;
        std::fs::remove_dir(&path).map_err(|e| TxError::Access { path, source: e })
    }

    /// Remove a file.
    pub fn unlink(&self, name: &str) -> TxResult<()> {
        let path = self.resolve(name)?;
        std::fs::remove_file(&path).map_err(|e| TxError::Access { path, source: e })
    }

    /// Stat a file or directory.
    pub fn metadata(&self, name: &str) -> TxResult<Metadata> {
        let path = self.resolve(name)?;
        std::fs::metadata(&path).map_err(|e| TxError::Access { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::DirVolumes;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    fn init_manager(root: &std::path::Path) -> TxManager<DirVolumes> {
        TxManager::init(root, DirVolumes::new()).unwrap()
    }

    #[test]
    fn test_reserved_names_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());
        manager.start_write().unwrap();

        for name in [".", "..", "/", ""] {
            assert!(
                matches!(manager.resolve(name), Err(TxError::InvalidName(_))),
                "'{}' should be rejected",
                name
            );
        }
        manager.abort().unwrap();
    }

    #[test]
    fn test_resolution_refused_outside_transaction() {
        let tmp = TempDir::new().unwrap();
        let manager = init_manager(tmp.path());
        assert!(matches!(
            manager.resolve("f"),
            Err(TxError::WrongState(_))
        ));
    }

    #[test]
    fn test_write_state_resolves_into_wr_snap() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());
        manager.start_write().unwrap();

        let path = manager.resolve("dir/f").unwrap();
        assert!(path.starts_with(manager.layout().wr_snap()));
        manager.abort().unwrap();
    }

    #[test]
    fn test_read_state_resolves_into_slot() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());
        manager.start_read().unwrap();

        let path = manager.resolve("f").unwrap();
        assert!(path.starts_with(manager.active_slot().unwrap()));
        manager.stop_read().unwrap();
    }

    #[test]
    fn test_leading_separator_stays_inside_tree() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());
        manager.start_write().unwrap();

        let path = manager.resolve("/etc/passwd").unwrap();
        assert!(path.starts_with(manager.layout().wr_snap()));
        manager.abort().unwrap();
    }

    #[test]
    fn test_file_round_trip_through_facade() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());

        manager.start_write().unwrap();
        manager.create("f").unwrap().write_all(b"hello").unwrap();
        manager.commit().unwrap();

        manager.start_read().unwrap();
        let mut contents = String::new();
        manager.open("f").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
        manager.stop_read().unwrap();
    }

    #[test]
    fn test_mkdir_rmdir_unlink_metadata() {
        let tmp = TempDir::new().unwrap();
        let mut manager = init_manager(tmp.path());
        manager.start_write().unwrap();

        manager.mkdir("d").unwrap();
        assert!(manager.metadata("d").unwrap().is_dir());

        manager.create("d/f").unwrap();
        assert!(manager.metadata("d/f").unwrap().is_file());

        manager.unlink("d/f").unwrap();
        assert!(manager.metadata("d/f").is_err());

        manager.rmdir("d").unwrap();
        assert!(manager.metadata("d").is_err());

        manager.abort().unwrap();
    }
}
