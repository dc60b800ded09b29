//! Subvolume adapter
//!
//! Thin synchronous facade over the four primitives the transaction core
//! consumes: subvolume probe, subvolume creation, snapshot creation, and
//! subvolume deletion. `BtrfsVolumes` talks to the kernel ioctl surface;
//! `DirVolumes` emulates the same semantics over ordinary directories for
//! filesystems without subvolume support (and for the test suite).

mod btrfs;
mod dir;
pub mod errors;
pub(crate) mod ioctl;

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

pub use btrfs::BtrfsVolumes;
pub use dir::DirVolumes;
pub use errors::{VolumeError, VolumeResult};

/// Operations the transaction core consumes from the filesystem.
///
/// All operations are synchronous: when a call returns `Ok`, the effect is
/// visible to every process sharing the filesystem.
pub trait VolumeOps {
    /// Whether `path` is a subvolume. `Err(Access)` when `path` cannot be
    /// stat'ed at all (including when it does not exist).
    fn is_subvolume(&self, path: &Path) -> VolumeResult<bool>;

    /// Create a new empty subvolume at `dest`. `dest` must not exist; its
    /// parent must exist and be accessible.
    fn create_subvolume(&self, dest: &Path) -> VolumeResult<()>;

    /// Snapshot subvolume `src` to `dest`.
    ///
    /// `dest` may be an existing directory (the snapshot is created inside
    /// it, named after `src`'s basename) or a non-existent path whose parent
    /// exists (the snapshot takes `dest`'s basename).
    fn create_snapshot(&self, src: &Path, dest: &Path, readonly: bool) -> VolumeResult<()>;

    /// Delete the subvolume at `path`. Irrevocable.
    fn delete_subvolume(&self, path: &Path) -> VolumeResult<()>;
}

/// Validate a single subvolume directory-entry name.
pub(crate) fn validate_name(name: &OsStr) -> VolumeResult<()> {
    let lossy = name.to_string_lossy();
    if name.is_empty() || lossy == "." || lossy == ".." || lossy.contains('/') {
        return Err(VolumeError::IncorrectName(lossy.into_owned()));
    }
    if name.len() >= ioctl::BTRFS_VOL_NAME_MAX {
        return Err(VolumeError::NameTooLong(lossy.into_owned()));
    }
    Ok(())
}

/// Parent directory of `path`, mapping the empty parent of a bare relative
/// name to `"."`.
pub(crate) fn parent_dir(path: &Path) -> VolumeResult<&Path> {
    match path.parent() {
        Some(p) if p == Path::new("") => Ok(Path::new(".")),
        Some(p) => Ok(p),
        None => Err(VolumeError::IncorrectName(
            path.to_string_lossy().into_owned(),
        )),
    }
}

/// Resolve a snapshot destination into `(directory, child name)`.
///
/// Existing directory: the snapshot lands inside it under `src`'s basename.
/// Non-existent path: the snapshot takes the path's basename, inside its
/// parent. Anything existing that is not a directory is refused.
pub(crate) fn resolve_snapshot_dest(
    src: &Path,
    dest: &Path,
) -> VolumeResult<(PathBuf, OsString)> {
    let (dir, name) = match fs::metadata(dest) {
        Ok(meta) if meta.is_dir() => {
            let name = src
                .file_name()
                .ok_or_else(|| VolumeError::IncorrectName(src.to_string_lossy().into_owned()))?;
            (dest.to_path_buf(), name.to_os_string())
        }
        Ok(_) => return Err(VolumeError::ExistsAndNotADir(dest.to_path_buf())),
        Err(_) => {
            let name = dest
                .file_name()
                .ok_or_else(|| VolumeError::IncorrectName(dest.to_string_lossy().into_owned()))?;
            (parent_dir(dest)?.to_path_buf(), name.to_os_string())
        }
    };
    validate_name(&name)?;
    Ok((dir, name))
}
