//! Raw btrfs ioctl surface
//!
//! The only filesystem-specific details in the system live here: the ioctl
//! numbers, argument structs, and the read-only snapshot flag. Numbers and
//! layouts follow `linux/btrfs.h`.

#![allow(non_camel_case_types)]

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use bitflags::bitflags;

/// `_IOW` magic shared by all btrfs ioctls.
const BTRFS_IOCTL_MAGIC: u8 = 0x94;

/// Maximum length of a path in `vol_args.name`.
pub const BTRFS_PATH_NAME_MAX: usize = 4087;
/// Maximum length of a name in `vol_args_v2.name`.
pub const BTRFS_SUBVOL_NAME_MAX: usize = 4039;
/// Maximum length of a single subvolume directory entry name.
pub const BTRFS_VOL_NAME_MAX: usize = 255;

/// Root inode number every subvolume root carries.
pub const SUBVOL_INODE: u64 = 256;

bitflags! {
    /// Flags accepted by `BTRFS_IOC_SNAP_CREATE_V2`.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SnapshotFlags: u64 {
        /// Create the snapshot read-only.
        const READONLY = 1 << 1;
    }
}

/// `struct btrfs_ioctl_vol_args`
#[repr(C)]
pub struct vol_args {
    pub fd: i64,
    pub name: [u8; BTRFS_PATH_NAME_MAX + 1],
}

impl Default for vol_args {
    fn default() -> Self {
        Self {
            fd: 0,
            name: [0; BTRFS_PATH_NAME_MAX + 1],
        }
    }
}

/// `struct btrfs_ioctl_vol_args_v2`
#[repr(C)]
pub struct vol_args_v2 {
    pub fd: i64,
    pub transid: u64,
    pub flags: u64,
    pub unused: [u64; 4],
    pub name: [u8; BTRFS_SUBVOL_NAME_MAX + 1],
}

impl Default for vol_args_v2 {
    fn default() -> Self {
        Self {
            fd: 0,
            transid: 0,
            flags: 0,
            unused: [0; 4],
            name: [0; BTRFS_SUBVOL_NAME_MAX + 1],
        }
    }
}

/// Copy a directory-entry name into a fixed ioctl name buffer.
///
/// The caller validates length beforehand; anything overlong is truncated at
/// the buffer boundary rather than overflowing.
pub fn name_bytes<const L: usize>(name: &OsStr) -> [u8; L] {
    let mut buf = [0u8; L];
    let bytes = name.as_bytes();
    let len = bytes.len().min(L - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

nix::ioctl_write_ptr!(subvol_create, BTRFS_IOCTL_MAGIC, 14, vol_args);
nix::ioctl_write_ptr!(snap_destroy, BTRFS_IOCTL_MAGIC, 15, vol_args);
nix::ioctl_write_ptr!(snap_create_v2, BTRFS_IOCTL_MAGIC, 23, vol_args_v2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_bytes_is_nul_terminated() {
        let buf: [u8; 16] = name_bytes(OsStr::new("head"));
        assert_eq!(&buf[..4], b"head");
        assert!(buf[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_name_bytes_truncates_at_buffer_boundary() {
        let buf: [u8; 4] = name_bytes(OsStr::new("abcdef"));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn test_vol_args_layout() {
        // fd + name, no padding surprises
        assert_eq!(
            std::mem::size_of::<vol_args>(),
            8 + BTRFS_PATH_NAME_MAX + 1
        );
        assert_eq!(
            std::mem::size_of::<vol_args_v2>(),
            8 + 8 + 8 + 32 + BTRFS_SUBVOL_NAME_MAX + 1
        );
    }
}
