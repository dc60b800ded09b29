//! btrfstxn - Transactional filesystem layer over btrfs subvolume snapshots
//!
//! A writable transaction observes a private, mutable snapshot of the
//! current committed tree and either atomically publishes it (commit) or
//! discards it (abort). Read-only transactions observe stable point-in-time
//! snapshots. A crash at any point leaves the managed root in a state the
//! next initialization deterministically recovers from.

pub mod cli;
pub mod crash_point;
pub mod layout;
pub mod locks;
pub mod observability;
pub mod state;
pub mod txn;
pub mod volume;

pub use state::TxState;
pub use txn::{TxError, TxManager, TxResult};
pub use volume::{BtrfsVolumes, DirVolumes, VolumeOps};
