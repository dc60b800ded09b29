//! Plain-directory emulation backend
//!
//! Emulates the adapter contract on filesystems without subvolume support:
//! a "subvolume" is an ordinary directory carrying a marker entry, and a
//! "snapshot" is a durable recursive copy. Every error case the transaction
//! core depends on behaves as it does on btrfs. The read-only flag is
//! recorded in the marker but not enforced by the filesystem.
//!
//! This backend is what the integration test suite runs against.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use super::errors::{VolumeError, VolumeResult};
use super::{parent_dir, resolve_snapshot_dest, validate_name, VolumeOps};

const MARKER_NAME: &str = ".subvol";
const MARKER_RW: &[u8] = b"rw\n";
const MARKER_RO: &[u8] = b"ro\n";

/// Emulation backend over ordinary directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirVolumes;

impl DirVolumes {
    pub fn new() -> Self {
        Self
    }

    /// Whether the emulated subvolume at `path` was snapshotted read-only.
    pub fn is_readonly(path: &Path) -> VolumeResult<bool> {
        let marker = path.join(MARKER_NAME);
        let mut contents = Vec::new();
        File::open(&marker)
            .and_then(|mut f| f.read_to_end(&mut contents))
            .map_err(|e| VolumeError::access(&marker, e))?;
        Ok(contents == MARKER_RO)
    }

    fn write_marker(dir: &Path, readonly: bool) -> VolumeResult<()> {
        let marker = dir.join(MARKER_NAME);
        let payload = if readonly { MARKER_RO } else { MARKER_RW };
        let mut file =
            File::create(&marker).map_err(|e| VolumeError::io("marker write", &marker, e))?;
        file.write_all(payload)
            .and_then(|_| file.sync_all())
            .map_err(|e| VolumeError::io("marker write", &marker, e))?;
        Ok(())
    }
}

/// fsync a directory so its entries are durable.
fn fsync_dir(path: &Path) -> VolumeResult<()> {
    let dir = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| VolumeError::access(path, e))?;
    dir.sync_all()
        .map_err(|e| VolumeError::io("directory fsync", path, e))
}

/// Copy a file byte-for-byte and fsync the destination.
fn copy_file_durable(src: &Path, dst: &Path) -> VolumeResult<()> {
    let mut src_file = File::open(src).map_err(|e| VolumeError::access(src, e))?;
    let mut dst_file = File::create(dst).map_err(|e| VolumeError::io("snapshot copy", dst, e))?;

    let mut buffer = [0u8; 8192];
    loop {
        let n = src_file
            .read(&mut buffer)
            .map_err(|e| VolumeError::io("snapshot copy", src, e))?;
        if n == 0 {
            break;
        }
        dst_file
            .write_all(&buffer[..n])
            .map_err(|e| VolumeError::io("snapshot copy", dst, e))?;
    }

    dst_file
        .sync_all()
        .map_err(|e| VolumeError::io("snapshot copy", dst, e))
}

/// Recursively copy a directory tree, fsyncing files and directories.
fn copy_tree_durable(src: &Path, dst: &Path) -> VolumeResult<()> {
    fs::create_dir_all(dst).map_err(|e| VolumeError::io("snapshot copy", dst, e))?;

    let entries = fs::read_dir(src).map_err(|e| VolumeError::access(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VolumeError::access(src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry
            .file_type()
            .map_err(|e| VolumeError::access(&src_path, e))?;
        if file_type.is_dir() {
            copy_tree_durable(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            copy_file_durable(&src_path, &dst_path)?;
        }
        // Symlinks and special files are not part of the emulated contract
    }

    fsync_dir(dst)
}

impl VolumeOps for DirVolumes {
    fn is_subvolume(&self, path: &Path) -> VolumeResult<bool> {
        let meta = fs::metadata(path).map_err(|e| VolumeError::access(path, e))?;
        Ok(meta.is_dir() && path.join(MARKER_NAME).is_file())
    }

    fn create_subvolume(&self, dest: &Path) -> VolumeResult<()> {
        if fs::symlink_metadata(dest).is_ok() {
            return Err(VolumeError::AlreadyExists(dest.to_path_buf()));
        }
        let name = dest
            .file_name()
            .ok_or_else(|| VolumeError::IncorrectName(dest.to_string_lossy().into_owned()))?;
        validate_name(name)?;

        let parent = parent_dir(dest)?;
        fs::metadata(parent).map_err(|e| VolumeError::access(parent, e))?;

        fs::create_dir(dest).map_err(|e| VolumeError::io("subvolume create", dest, e))?;
        Self::write_marker(dest, false)?;
        fsync_dir(parent)
    }

    fn create_snapshot(&self, src: &Path, dest: &Path, readonly: bool) -> VolumeResult<()> {
        if !self.is_subvolume(src)? {
            return Err(VolumeError::NotASubvolume(src.to_path_buf()));
        }
        let (dest_dir, name) = resolve_snapshot_dest(src, dest)?;
        fs::metadata(&dest_dir).map_err(|e| VolumeError::access(&dest_dir, e))?;
        let target = dest_dir.join(&name);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(VolumeError::AlreadyExists(target));
        }

        // Any failure must not leave a partial snapshot behind
        let result = copy_tree_durable(src, &target)
            .and_then(|_| Self::write_marker(&target, readonly))
            .and_then(|_| fsync_dir(&dest_dir));
        if result.is_err() {
            let _ = fs::remove_dir_all(&target);
        }
        result
    }

    fn delete_subvolume(&self, path: &Path) -> VolumeResult<()> {
        if !self.is_subvolume(path)? {
            return Err(VolumeError::NotASubvolume(path.to_path_buf()));
        }

        let canonical = fs::canonicalize(path).map_err(|e| VolumeError::access(path, e))?;
        let name = canonical
            .file_name()
            .ok_or_else(|| VolumeError::IncorrectName(canonical.to_string_lossy().into_owned()))?;
        validate_name(name)?;

        fs::remove_dir_all(&canonical).map_err(|e| VolumeError::Delete {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
