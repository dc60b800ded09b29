//! Initialization and crash-recovery tests
//!
//! Covers:
//! - fresh install creates the canonical layout
//! - init is idempotent on a clean state
//! - a mid-commit crash state (head_old without head) recovers
//!   deterministically
//! - a leftover writable snapshot from a crashed write tx is deleted
//! - unrecognized layouts are reported as corrupt

use std::fs;
use std::path::Path;

use btrfstxn::volume::{DirVolumes, VolumeOps};
use btrfstxn::{TxError, TxManager, TxState};
use tempfile::TempDir;

fn init(root: &Path) -> Result<TxManager<DirVolumes>, TxError> {
    TxManager::init(root, DirVolumes::new())
}

#[test]
fn test_fresh_install_creates_head_and_ro_snaps() {
    let tmp = TempDir::new().unwrap();
    let manager = init(tmp.path()).unwrap();

    assert_eq!(manager.state(), TxState::Initialized);

    let vols = DirVolumes::new();
    assert!(vols.is_subvolume(manager.layout().head()).unwrap());
    assert!(vols.is_subvolume(manager.layout().ro_snaps()).unwrap());
    assert!(!manager.layout().head_old().exists());
    assert!(!manager.layout().wr_snap().exists());
}

#[test]
fn test_init_idempotent_on_clean_state() {
    let tmp = TempDir::new().unwrap();
    drop(init(tmp.path()).unwrap());

    // A second init over the same root changes nothing
    let manager = init(tmp.path()).unwrap();
    assert_eq!(manager.state(), TxState::Initialized);
    assert!(manager.layout().head().exists());
    assert!(!manager.layout().head_old().exists());
}

#[test]
fn test_mid_commit_crash_state_recovers() {
    let tmp = TempDir::new().unwrap();

    // Commit some content, then simulate a crash inside the commit window:
    // the retired head still carries the transient name and no new head
    // was published
    {
        let mut manager = init(tmp.path()).unwrap();
        manager.start_write().unwrap();
        fs::write(manager.layout().wr_snap().join("f"), b"committed").unwrap();
        manager.commit().unwrap();

        fs::rename(manager.layout().head(), manager.layout().head_old()).unwrap();
    }

    let manager = init(tmp.path()).unwrap();
    assert_eq!(manager.state(), TxState::Initialized);
    assert!(manager.layout().head().exists());
    assert!(!manager.layout().head_old().exists());
    assert_eq!(
        fs::read(manager.layout().head().join("f")).unwrap(),
        b"committed"
    );
}

#[test]
fn test_recovery_is_deterministic_across_repeats() {
    let tmp = TempDir::new().unwrap();
    {
        let manager = init(tmp.path()).unwrap();
        fs::rename(manager.layout().head(), manager.layout().head_old()).unwrap();
    }

    drop(init(tmp.path()).unwrap());
    // The repaired state is clean; further inits pass through unchanged
    let manager = init(tmp.path()).unwrap();
    assert!(manager.layout().head().exists());
    assert!(!manager.layout().head_old().exists());
}

#[test]
fn test_stale_write_snapshot_deleted_on_clean_init() {
    let tmp = TempDir::new().unwrap();
    {
        let manager = init(tmp.path()).unwrap();
        // A crashed write tx leaves its writable snapshot behind
        DirVolumes::new()
            .create_snapshot(manager.layout().head(), manager.layout().wr_snap(), false)
            .unwrap();
    }

    let manager = init(tmp.path()).unwrap();
    assert_eq!(manager.state(), TxState::Initialized);
    assert!(!manager.layout().wr_snap().exists());
}

#[test]
fn test_stale_write_snapshot_deleted_during_recovery() {
    let tmp = TempDir::new().unwrap();
    {
        let mut manager = init(tmp.path()).unwrap();
        manager.start_write().unwrap();
        fs::write(manager.layout().wr_snap().join("g"), b"dirty").unwrap();
        manager.commit().unwrap();

        // Crash inside the commit window of a later tx, with a writable
        // snapshot also left behind
        DirVolumes::new()
            .create_snapshot(manager.layout().head(), manager.layout().wr_snap(), false)
            .unwrap();
        fs::rename(manager.layout().head(), manager.layout().head_old()).unwrap();
    }

    let manager = init(tmp.path()).unwrap();
    assert_eq!(manager.state(), TxState::Initialized);
    assert!(manager.layout().head().exists());
    assert!(!manager.layout().wr_snap().exists());
}

#[test]
fn test_both_heads_present_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    {
        let manager = init(tmp.path()).unwrap();
        // Manufacture the unrecognizable state: both heads present
        fs::create_dir(manager.layout().head_old()).unwrap();
    }

    let err = init(tmp.path()).unwrap_err();
    assert!(matches!(err, TxError::Corrupt(_)));
}

#[test]
fn test_head_without_ro_snaps_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("head")).unwrap();

    let err = init(tmp.path()).unwrap_err();
    assert!(matches!(err, TxError::Corrupt(_)));
}

#[test]
fn test_ro_snaps_alone_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("ro_snaps")).unwrap();

    let err = init(tmp.path()).unwrap_err();
    assert!(matches!(err, TxError::Corrupt(_)));
}

#[test]
fn test_missing_root_is_access_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent");
    let err = init(&missing).unwrap_err();
    assert!(matches!(err, TxError::Access { .. }));
}
