//! Transaction state machine
//!
//! A single in-process state variable governs which transaction operations
//! are legal. This is a pure type: it performs no I/O and holds no paths.
//!
//! Legal transitions:
//!
//! | From          | Operation            | To          |
//! |---------------|----------------------|-------------|
//! | Uninitialized | init (ok)            | Initialized |
//! | Uninitialized | init (corruption)    | Error       |
//! | Initialized   | start_write          | Write       |
//! | Initialized   | start_read           | Read        |
//! | Write         | commit / abort (ok)  | Initialized |
//! | Read          | stop_read (ok)       | Initialized |
//! | Write / Read  | internal failure     | Error       |
//!
//! Any call from a state not listed returns `WrongState` without side
//! effects. `Error` is terminal within the process.

use thiserror::Error;

/// Process-local transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No manager has been initialized yet
    Uninitialized,
    /// Manager is initialized, no transaction in progress
    Initialized,
    /// A write transaction is in progress
    Write,
    /// A read-only transaction is in progress
    Read,
    /// An invariant may have been violated; all further operations refuse
    Error,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Uninitialized => "uninitialized",
            TxState::Initialized => "initialized",
            TxState::Write => "write",
            TxState::Read => "read",
            TxState::Error => "error",
        }
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An operation was attempted from a state that does not permit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation requires state '{required}' but manager is in '{current}'")]
pub struct WrongState {
    pub current: TxState,
    pub required: &'static str,
}

/// Holder of the current state with transition discipline.
///
/// Entry into `Error` is sticky: once there, `expect` always refuses and
/// `transition` is a no-op.
#[derive(Debug)]
pub struct StateMachine {
    state: TxState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: TxState::Uninitialized,
        }
    }

    /// The current state.
    pub fn current(&self) -> TxState {
        self.state
    }

    /// Refuse unless the machine is exactly in `required`.
    ///
    /// Refusal has no side effects; in particular it does not enter `Error`.
    pub fn expect(&self, required: TxState) -> Result<(), WrongState> {
        if self.state == required {
            Ok(())
        } else {
            Err(WrongState {
                current: self.state,
                required: required.as_str(),
            })
        }
    }

    /// Move to `to`. Ignored once the machine is in `Error`.
    pub fn transition(&mut self, to: TxState) {
        if self.state != TxState::Error {
            self.state = to;
        }
    }

    /// Enter the terminal `Error` state.
    pub fn fail(&mut self) {
        self.state = TxState::Error;
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_uninitialized() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), TxState::Uninitialized);
    }

    #[test]
    fn test_legal_write_cycle() {
        let mut sm = StateMachine::new();
        sm.transition(TxState::Initialized);
        assert!(sm.expect(TxState::Initialized).is_ok());
        sm.transition(TxState::Write);
        assert!(sm.expect(TxState::Write).is_ok());
        sm.transition(TxState::Initialized);
        assert_eq!(sm.current(), TxState::Initialized);
    }

    #[test]
    fn test_legal_read_cycle() {
        let mut sm = StateMachine::new();
        sm.transition(TxState::Initialized);
        sm.transition(TxState::Read);
        assert!(sm.expect(TxState::Read).is_ok());
        sm.transition(TxState::Initialized);
        assert_eq!(sm.current(), TxState::Initialized);
    }

    #[test]
    fn test_expect_refusal_reports_both_states() {
        let sm = StateMachine::new();
        let err = sm.expect(TxState::Write).unwrap_err();
        assert_eq!(err.current, TxState::Uninitialized);
        assert_eq!(err.required, "write");
    }

    #[test]
    fn test_expect_refusal_has_no_side_effect() {
        let sm = StateMachine::new();
        let _ = sm.expect(TxState::Write);
        assert_eq!(sm.current(), TxState::Uninitialized);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut sm = StateMachine::new();
        sm.transition(TxState::Initialized);
        sm.fail();
        assert_eq!(sm.current(), TxState::Error);

        // No transition can leave Error
        sm.transition(TxState::Initialized);
        assert_eq!(sm.current(), TxState::Error);
        sm.transition(TxState::Write);
        assert_eq!(sm.current(), TxState::Error);
    }

    #[test]
    fn test_error_refuses_everything() {
        let mut sm = StateMachine::new();
        sm.fail();
        for required in [
            TxState::Uninitialized,
            TxState::Initialized,
            TxState::Write,
            TxState::Read,
        ] {
            assert!(sm.expect(required).is_err());
        }
    }

    #[test]
    fn test_wrong_state_display() {
        let err = WrongState {
            current: TxState::Read,
            required: TxState::Initialized.as_str(),
        };
        let msg = err.to_string();
        assert!(msg.contains("read"));
        assert!(msg.contains("initialized"));
    }
}
