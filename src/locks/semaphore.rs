//! POSIX named semaphore wrapper
//!
//! Semaphores are opened (created if absent, mode 0644) on entry to a
//! critical section and closed on exit. They are never unlinked: other
//! processes sharing the managed root may still hold them, and a
//! pre-existing semaphore must always be usable as-is.
//!
//! Note that the initial count only applies when the semaphore is first
//! created; reopening an existing semaphore leaves its current count
//! untouched.

use std::ffi::CString;
use std::io;

use super::errors::{LockError, LockResult};

/// An open handle to a named, cross-process counting semaphore.
///
/// Dropping the handle closes it without releasing any acquisition still
/// held; a crashed or failed holder is the domain of crash recovery, not of
/// this type.
#[derive(Debug)]
pub struct NamedSemaphore {
    name: String,
    handle: *mut libc::sem_t,
}

impl NamedSemaphore {
    /// Open the semaphore `name`, creating it with `initial` permits and
    /// mode 0644 if it does not exist yet.
    pub fn open(name: &str, initial: u32) -> LockResult<Self> {
        let c_name = CString::new(name)
            .map_err(|_| LockError::InvalidName(name.to_string()))?;

        let handle = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o644 as libc::mode_t,
                initial as libc::c_uint,
            )
        };
        if handle == libc::SEM_FAILED {
            return Err(LockError::Open {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until a permit is available, retrying transparently when the
    /// wait is interrupted by an unrelated signal.
    pub fn wait(&self) -> LockResult<()> {
        self.wait_interruptible(|| false)
    }

    /// Block until a permit is available. When the wait is interrupted and
    /// `interrupted()` reports true (a termination signal has been
    /// recorded), give up with `LockError::Interrupted` instead of
    /// retrying.
    pub fn wait_interruptible(&self, interrupted: impl Fn() -> bool) -> LockResult<()> {
        loop {
            let ret = unsafe { libc::sem_wait(self.handle) };
            if ret == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                if interrupted() {
                    return Err(LockError::Interrupted {
                        name: self.name.clone(),
                    });
                }
                continue;
            }
            return Err(LockError::Wait {
                name: self.name.clone(),
                source: err,
            });
        }
    }

    /// Take a permit without blocking. Returns false when none is
    /// available.
    pub fn try_wait(&self) -> LockResult<bool> {
        let ret = unsafe { libc::sem_trywait(self.handle) };
        if ret == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EAGAIN) {
            return Ok(false);
        }
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        Err(LockError::Wait {
            name: self.name.clone(),
            source: err,
        })
    }

    /// Release one permit.
    pub fn post(&self) -> LockResult<()> {
        let ret = unsafe { libc::sem_post(self.handle) };
        if ret != 0 {
            return Err(LockError::Post {
                name: self.name.clone(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Close our handle only; the semaphore itself stays for other
        // processes.
        unsafe {
            libc::sem_close(self.handle);
        }
    }
}
