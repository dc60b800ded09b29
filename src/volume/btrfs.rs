//! btrfs backend for the subvolume adapter
//!
//! Subvolume detection is a `stat` returning the reserved root inode (256)
//! on a directory; creation, snapshotting, and deletion are ioctls issued on
//! the parent directory's file descriptor.

use std::fs;
use std::io;
use std::os::fd::AsRawFd;
use std::os::linux::fs::MetadataExt;
use std::path::Path;

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::sys::statfs::{statfs, BTRFS_SUPER_MAGIC};

use super::errors::{VolumeError, VolumeResult};
use super::ioctl::{self, SnapshotFlags};
use super::{parent_dir, resolve_snapshot_dest, validate_name, VolumeOps};

/// The real adapter backend, backed by the btrfs ioctl surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct BtrfsVolumes;

impl BtrfsVolumes {
    pub fn new() -> Self {
        Self
    }

    fn open_dir(path: &Path) -> VolumeResult<Dir> {
        Dir::open(path, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty())
            .map_err(|e| VolumeError::access(path, io::Error::from(e)))
    }

    fn ensure_btrfs(path: &Path) -> VolumeResult<()> {
        let fs_stat = statfs(path).map_err(|e| VolumeError::access(path, io::Error::from(e)))?;
        if fs_stat.filesystem_type() != BTRFS_SUPER_MAGIC {
            return Err(VolumeError::NotBtrfs(path.to_path_buf()));
        }
        Ok(())
    }
}

impl VolumeOps for BtrfsVolumes {
    fn is_subvolume(&self, path: &Path) -> VolumeResult<bool> {
        let meta = fs::metadata(path).map_err(|e| VolumeError::access(path, e))?;
        Ok(meta.is_dir() && meta.st_ino() == ioctl::SUBVOL_INODE)
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
        Self::ensure_btrfs(parent)?;
        let parent_fd = Self::open_dir(parent)?;

        let args = ioctl::vol_args {
            fd: 0,
            name: ioctl::name_bytes(name),
        };
        unsafe { ioctl::subvol_create(parent_fd.as_raw_fd(), &args) }
            .map_err(|e| VolumeError::io("subvolume create", dest, io::Error::from(e)))?;
        Ok(())
    }

    fn create_snapshot(&self, src: &Path, dest: &Path, readonly: bool) -> VolumeResult<()> {
        if !self.is_subvolume(src)? {
            return Err(VolumeError::NotASubvolume(src.to_path_buf()));
        }
        let (dest_dir, name) = resolve_snapshot_dest(src, dest)?;

        Self::ensure_btrfs(&dest_dir)?;
        let dest_fd = Self::open_dir(&dest_dir)?;
        let src_fd = Self::open_dir(src)?;

        let mut flags = SnapshotFlags::empty();
        if readonly {
            flags |= SnapshotFlags::READONLY;
        }

        let args = ioctl::vol_args_v2 {
            fd: src_fd.as_raw_fd() as i64,
            flags: flags.bits(),
            name: ioctl::name_bytes(&name),
            ..Default::default()
        };
        unsafe { ioctl::snap_create_v2(dest_fd.as_raw_fd(), &args) }
            .map_err(|e| VolumeError::io("snapshot create", dest, io::Error::from(e)))?;
        Ok(())
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

        let parent = parent_dir(&canonical)?;
        let parent_fd = Self::open_dir(parent)?;

        let args = ioctl::vol_args {
            fd: 0,
            name: ioctl::name_bytes(name),
        };
        unsafe { ioctl::snap_destroy(parent_fd.as_raw_fd(), &args) }.map_err(|e| {
            VolumeError::Delete {
                path: path.to_path_buf(),
                source: io::Error::from(e),
            }
        })?;
        Ok(())
    }
}
