//! Transaction manager
//!
//! Orchestrates initialization/recovery, the write-commit/abort and
//! read-start/stop protocols, and signal-driven cleanup over one managed
//! root. Consults the state machine before every operation, takes the
//! appropriate cross-process locks, computes paths through the layout
//! manager, and issues subvolume calls through the volume adapter.

use std::fs;
use std::path::{Path, PathBuf};

use crate::crash_point::{self, points};
use crate::layout::{Layout, DEFAULT_MAX_READ_SLOTS};
use crate::locks::{LockManager, NamedSemaphore};
use crate::observability::{log_event, log_event_with_fields, log_failure, Event};
use crate::state::{StateMachine, TxState, WrongState};
use crate::volume::VolumeOps;

use super::errors::{TxError, TxResult};
use super::signals;

/// State held for the duration of a write transaction.
#[derive(Debug)]
struct WriteTx {
    write_sem: NamedSemaphore,
}

/// State held for the duration of a read-only transaction.
#[derive(Debug)]
struct ReadTx {
    read_sem: NamedSemaphore,
    slot: PathBuf,
}

/// The transaction manager for one managed root.
///
/// Constructed by [`TxManager::init`]; all transaction operations are
/// methods on the constructed value. One value serves one root; at most one
/// transaction is in progress per value at a time.
#[derive(Debug)]
pub struct TxManager<V: VolumeOps> {
    volumes: V,
    layout: Layout,
    locks: LockManager,
    state: StateMachine,
    write_tx: Option<WriteTx>,
    read_tx: Option<ReadTx>,
}

impl<V: VolumeOps> TxManager<V> {
    /// Initialize over `root` with the default read-slot bound.
    pub fn init(root: impl AsRef<Path>, volumes: V) -> TxResult<Self> {
        Self::init_with_slots(root, volumes, DEFAULT_MAX_READ_SLOTS)
    }

    /// Initialize over `root`.
    ///
    /// Performs the crash-recovery case analysis: a fresh root gets its
    /// `head` and read-snapshot container created; a clean root passes
    /// through; a mid-commit crash state is repaired by renaming `head_old`
    /// back to `head`. Any other layout is corrupt. A leftover writable
    /// snapshot from a crashed write transaction is deleted in every
    /// recognized case.
    pub fn init_with_slots(
        root: impl AsRef<Path>,
        volumes: V,
        max_read_slots: usize,
    ) -> TxResult<Self> {
        signals::install();

        let root = root.as_ref();
        log_event_with_fields(Event::InitStart, &[("root", &root.to_string_lossy())]);

        let canonical = fs::canonicalize(root).map_err(|e| {
            let err = TxError::Access {
                path: root.to_path_buf(),
                source: e,
            };
            log_failure("init", &root.to_string_lossy(), &err.to_string());
            err
        })?;

        let layout = Layout::new(&canonical, max_read_slots);
        let locks = LockManager::new(&canonical, max_read_slots);
        let mut manager = Self {
            volumes,
            layout,
            locks,
            state: StateMachine::new(),
            write_tx: None,
            read_tx: None,
        };

        manager.recover()?;

        manager.state.transition(TxState::Initialized);
        log_event_with_fields(
            Event::InitComplete,
            &[("root", &canonical.to_string_lossy())],
        );
        Ok(manager)
    }

    /// The current transaction state.
    pub fn state(&self) -> TxState {
        self.state.current()
    }

    /// The canonicalized managed root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// The on-disk layout under the managed root.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The read-only slot serving the active read transaction, if any.
    pub fn active_slot(&self) -> Option<&Path> {
        self.read_tx.as_ref().map(|tx| tx.slot.as_path())
    }

    /// Path the redirection facade prefixes onto client names, per state.
    pub(super) fn redirect_base(&self) -> Option<&Path> {
        match self.state.current() {
            TxState::Read => self.active_slot(),
            TxState::Write => Some(self.layout.wr_snap()),
            _ => None,
        }
    }

    /// Start a write transaction.
    ///
    /// Blocks until this process holds the cluster-wide write lock, then
    /// snapshots `head` into the writable scratch tree.
    pub fn start_write(&mut self) -> TxResult<()> {
        self.state
            .expect(TxState::Initialized)
            .map_err(|e| self.refuse("start_write", e))?;

        let head = self.layout.head().to_path_buf();
        let wr_snap = self.layout.wr_snap().to_path_buf();

        let write_sem = self
            .locks
            .write_lock()
            .map_err(|e| self.fail("start_write", &head, e.into()))?;
        write_sem
            .wait_interruptible(|| signals::pending().is_some())
            .map_err(|e| self.fail("start_write", &head, e.into()))?;

        // Admission may have blocked for a while; re-check that head is
        // still a subvolume before snapshotting it.
        match self.volumes.is_subvolume(&head) {
            Ok(true) => {}
            Ok(false) => {
                let _ = write_sem.post();
                return Err(self.fail("start_write", &head, TxError::NotASubvolume(head.clone())));
            }
            Err(e) => {
                let _ = write_sem.post();
                return Err(self.fail("start_write", &head, e.into()));
            }
        }

        if let Err(e) = self.volumes.create_snapshot(&head, &wr_snap, false) {
            let _ = write_sem.post();
            return Err(self.fail("start_write", &wr_snap, e.into()));
        }
        crash_point::maybe_crash(points::WRITE_AFTER_SNAPSHOT);

        self.write_tx = Some(WriteTx { write_sem });
        self.state.transition(TxState::Write);
        log_event(Event::WriteStart);
        Ok(())
    }

    /// Atomically publish the write transaction's tree as the new `head`.
    ///
    /// The swap window (between the two renames) is serialized against
    /// read-transaction snapshot creation by the rename-window lock. A
    /// crash anywhere inside this protocol is repaired by the next init.
    pub fn commit(&mut self) -> TxResult<()> {
        self.state
            .expect(TxState::Write)
            .map_err(|e| self.refuse("commit", e))?;

        let head = self.layout.head().to_path_buf();
        let head_old = self.layout.head_old().to_path_buf();
        let wr_snap = self.layout.wr_snap().to_path_buf();
        log_event(Event::CommitStart);

        let rename_sem = self
            .locks
            .rename_window()
            .map_err(|e| self.fail("commit", &head, e.into()))?;
        rename_sem
            .wait_interruptible(|| signals::pending().is_some())
            .map_err(|e| self.fail("commit", &head, e.into()))?;

        crash_point::maybe_crash(points::COMMIT_BEFORE_RETIRE);

        // Retire the current head
        fs::rename(&head, &head_old).map_err(|e| {
            self.fail(
                "commit",
                &head,
                TxError::Rename {
                    from: head.clone(),
                    to: head_old.clone(),
                    source: e,
                },
            )
        })?;
        crash_point::maybe_crash(points::COMMIT_AFTER_RETIRE);

        // Flush data and metadata so the retired tree is durable before the
        // new one takes its name
        unsafe {
            libc::sync();
        }
        crash_point::maybe_crash(points::COMMIT_AFTER_SYNC);

        // Publish: after this rename the new tree is authoritative
        fs::rename(&wr_snap, &head).map_err(|e| {
            self.fail(
                "commit",
                &wr_snap,
                TxError::Rename {
                    from: wr_snap.clone(),
                    to: head.clone(),
                    source: e,
                },
            )
        })?;
        log_event(Event::CommitPublished);
        crash_point::maybe_crash(points::COMMIT_AFTER_PUBLISH);

        rename_sem
            .post()
            .map_err(|e| self.fail("commit", &head, e.into()))?;
        drop(rename_sem);

        crash_point::maybe_crash(points::COMMIT_BEFORE_CLEANUP);

        self.volumes
            .delete_subvolume(&head_old)
            .map_err(|e| self.fail("commit", &head_old, e.into()))?;

        let write_tx = self.write_tx.take().ok_or_else(|| {
            TxError::Unspecified("write lock handle missing at commit".to_string())
        })?;
        write_tx
            .write_sem
            .post()
            .map_err(|e| self.fail("commit", &head, e.into()))?;

        self.state.transition(TxState::Initialized);
        log_event(Event::CommitComplete);
        Ok(())
    }

    /// Discard the write transaction's tree.
    pub fn abort(&mut self) -> TxResult<()> {
        self.state
            .expect(TxState::Write)
            .map_err(|e| self.refuse("abort", e))?;

        let wr_snap = self.layout.wr_snap().to_path_buf();
        self.volumes
            .delete_subvolume(&wr_snap)
            .map_err(|e| self.fail("abort", &wr_snap, e.into()))?;

        let write_tx = self.write_tx.take().ok_or_else(|| {
            TxError::Unspecified("write lock handle missing at abort".to_string())
        })?;
        write_tx
            .write_sem
            .post()
            .map_err(|e| self.fail("abort", &wr_snap, e.into()))?;

        self.state.transition(TxState::Initialized);
        log_event(Event::AbortComplete);
        Ok(())
    }

    /// Start a read-only transaction.
    ///
    /// Blocks until a read slot is admitted, then snapshots `head`
    /// read-only into the lowest free slot. Slot allocation and snapshot
    /// creation happen inside the rename window, so the captured head is
    /// never one that a commit is mid-swap on.
    pub fn start_read(&mut self) -> TxResult<()> {
        self.state
            .expect(TxState::Initialized)
            .map_err(|e| self.refuse("start_read", e))?;

        let head = self.layout.head().to_path_buf();
        let ro_snaps = self.layout.ro_snaps().to_path_buf();

        let read_sem = self
            .locks
            .read_slots()
            .map_err(|e| self.fail("start_read", &ro_snaps, e.into()))?;
        read_sem
            .wait_interruptible(|| signals::pending().is_some())
            .map_err(|e| self.fail("start_read", &ro_snaps, e.into()))?;

        let rename_sem = self
            .locks
            .rename_window()
            .map_err(|e| self.fail("start_read", &ro_snaps, e.into()))?;
        rename_sem
            .wait_interruptible(|| signals::pending().is_some())
            .map_err(|e| self.fail("start_read", &ro_snaps, e.into()))?;

        let slot = match self.layout.first_free_slot() {
            Some(slot) => slot,
            None => {
                // Slots can only all be occupied if crashed readers leaked
                // them; admission otherwise bounds us below the slot count
                let _ = rename_sem.post();
                return Err(self.fail(
                    "start_read",
                    &ro_snaps,
                    TxError::Unspecified("no free read-only snapshot slot".to_string()),
                ));
            }
        };

        let snapshot_result = self.volumes.create_snapshot(&head, &slot, true);
        let post_result = rename_sem.post();
        if let Err(e) = snapshot_result {
            return Err(self.fail("start_read", &slot, e.into()));
        }
        if let Err(e) = post_result {
            return Err(self.fail("start_read", &slot, e.into()));
        }
        crash_point::maybe_crash(points::READ_AFTER_SNAPSHOT);

        log_event_with_fields(Event::ReadStart, &[("slot", &slot.to_string_lossy())]);
        self.read_tx = Some(ReadTx { read_sem, slot });
        self.state.transition(TxState::Read);
        Ok(())
    }

    /// Stop the read-only transaction and free its slot.
    pub fn stop_read(&mut self) -> TxResult<()> {
        self.state
            .expect(TxState::Read)
            .map_err(|e| self.refuse("stop_read", e))?;

        let read_tx = self.read_tx.take().ok_or_else(|| {
            TxError::Unspecified("read slot record missing at stop".to_string())
        })?;

        if let Err(e) = self.volumes.delete_subvolume(&read_tx.slot) {
            return Err(self.fail("stop_read", &read_tx.slot, e.into()));
        }
        read_tx
            .read_sem
            .post()
            .map_err(|e| self.fail("stop_read", &read_tx.slot, e.into()))?;

        self.state.transition(TxState::Initialized);
        log_event(Event::ReadStop);
        Ok(())
    }

    /// Run the signal-driven cleanup if a termination signal was recorded:
    /// stop the active read transaction, or abort the active write
    /// transaction, and hand back the signal number for the caller to exit
    /// with.
    pub fn drive_pending_cleanup(&mut self) -> TxResult<Option<i32>> {
        let Some(signum) = signals::pending() else {
            return Ok(None);
        };
        log_event_with_fields(Event::SignalCaught, &[("signal", &signum.to_string())]);

        match self.state.current() {
            TxState::Read => self.stop_read()?,
            TxState::Write => self.abort()?,
            _ => {}
        }

        signals::clear();
        log_event(Event::SignalCleanup);
        Ok(Some(signum))
    }

    /// Init-time crash-recovery case analysis.
    fn recover(&mut self) -> TxResult<()> {
        let root = self.layout.root().to_path_buf();
        let head = self.layout.head().to_path_buf();
        let head_old = self.layout.head_old().to_path_buf();
        let ro_snaps = self.layout.ro_snaps().to_path_buf();

        let have_head = head.exists();
        let have_head_old = head_old.exists();
        let have_ro_snaps = ro_snaps.exists();

        // Fresh install: nothing managed exists yet
        if !have_head && !have_head_old && !have_ro_snaps {
            for path in [&head, &ro_snaps] {
                self.volumes.create_subvolume(path).map_err(|e| {
                    let err: TxError = e.into();
                    log_failure("init", &path.to_string_lossy(), &err.to_string());
                    err
                })?;
            }
            log_event_with_fields(Event::InitFresh, &[("root", &root.to_string_lossy())]);
            return Ok(());
        }

        // Clean state
        if have_head && have_ro_snaps && !have_head_old {
            return self.clear_stale_write_snapshot();
        }

        // Mid-commit crash: the retired head still carries the transient
        // name; give it back its authority
        if have_head_old && have_ro_snaps && !have_head {
            crash_point::maybe_crash(points::RECOVERY_BEFORE_RENAME);
            fs::rename(&head_old, &head).map_err(|e| {
                let err = TxError::Rename {
                    from: head_old.clone(),
                    to: head.clone(),
                    source: e,
                };
                log_failure("init", &head_old.to_string_lossy(), &err.to_string());
                err
            })?;
            self.clear_stale_write_snapshot()?;
            log_event_with_fields(Event::InitRecovered, &[("root", &root.to_string_lossy())]);
            return Ok(());
        }

        log_event_with_fields(Event::InitCorrupt, &[("root", &root.to_string_lossy())]);
        Err(TxError::Corrupt(root))
    }

    /// Delete a writable snapshot left behind by a crashed write tx.
    fn clear_stale_write_snapshot(&mut self) -> TxResult<()> {
        let wr_snap = self.layout.wr_snap().to_path_buf();
        if wr_snap.exists() {
            self.volumes.delete_subvolume(&wr_snap).map_err(|e| {
                let err: TxError = e.into();
                log_failure("init", &wr_snap.to_string_lossy(), &err.to_string());
                err
            })?;
            log_event_with_fields(
                Event::InitStaleWriteSnapshotDeleted,
                &[("path", &wr_snap.to_string_lossy())],
            );
        }
        Ok(())
    }

    /// Log the single diagnostic line for a failing path and drive the
    /// state machine to its terminal Error state.
    fn fail(&mut self, operation: &'static str, path: &Path, err: TxError) -> TxError {
        log_failure(operation, &path.to_string_lossy(), &err.to_string());
        self.state.fail();
        err
    }

    /// Log a wrong-state refusal. Refusals have no side effects: the state
    /// machine is left exactly as it was.
    fn refuse(&self, operation: &'static str, err: WrongState) -> TxError {
        let err = TxError::WrongState(err);
        log_failure(
            operation,
            &self.layout.root().to_string_lossy(),
            &err.to_string(),
        );
        err
    }
}
