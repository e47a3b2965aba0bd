//! Lock-while-moving admission policy.

use thiserror::Error;

/// Reason a command was refused admission.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// The mount is in motion and the lock-while-moving policy is active.
    #[error("mount is moving; command locked (disable lock-while-moving to override)")]
    LockedWhileMoving,
}

/// Gates movement-affecting commands while the mount is in motion.
///
/// Pure policy check, no I/O. Callers consult the guard before dispatching
/// and skip the dispatch entirely when denied; there is no send-then-discard
/// path.
#[derive(Debug, Clone, Copy)]
pub struct CommandGuard {
    lock_while_moving: bool,
}

impl CommandGuard {
    pub fn new(lock_while_moving: bool) -> Self {
        Self { lock_while_moving }
    }

    /// Whether the lock-while-moving policy is enabled.
    pub fn lock_while_moving(&self) -> bool {
        self.lock_while_moving
    }

    /// True when a command may be issued given the current motion state.
    pub fn may_issue(&self, ignore_lock: bool, moving: bool) -> bool {
        ignore_lock || !self.lock_while_moving || !moving
    }

    /// Typed-result form of [`may_issue`](Self::may_issue).
    pub fn admit(&self, ignore_lock: bool, moving: bool) -> Result<(), Denied> {
        if self.may_issue(ignore_lock, moving) {
            Ok(())
        } else {
            Err(Denied::LockedWhileMoving)
        }
    }
}
