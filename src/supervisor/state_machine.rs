//! Lifecycle state machine for the managed tunnel process.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// Lifecycle state of the supervisor. Exactly one value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No tunnel process is managed.
    Idle,
    /// A spin-up is in progress; the child may not be verified yet.
    Starting,
    /// The child passed the startup probe and is considered live.
    Running,
    /// A spin-down is in progress; termination has been initiated.
    Stopping,
}

impl LifecycleState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

/// Holds the current lifecycle state.
///
/// Reads are lock-free atomic loads; writes are validated against the
/// transition table and serialized by an internal mutex so that check and
/// store are atomic with respect to concurrent callers.
#[derive(Debug)]
pub struct StateMachine {
    current: AtomicU8,
    write_lock: Mutex<()>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a state machine in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(LifecycleState::Idle.as_u8()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current state, read without blocking.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.current.load(Ordering::SeqCst))
    }

    /// Whether the move appears in the transition table.
    #[must_use]
    pub fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
        use LifecycleState::{Idle, Running, Starting, Stopping};
        matches!(
            (from, to),
            (Idle, Starting)
                | (Starting, Running | Idle)
                | (Running, Stopping | Idle)
                | (Stopping, Idle)
        )
    }

    /// Perform a validated transition.
    ///
    /// Returns `false` without changing state when the move is not in the
    /// table. A poisoned write lock is recovered rather than propagated so
    /// the lifecycle stays reachable after a panicked holder.
    pub fn transition_to(&self, next: LifecycleState) -> bool {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let current = self.state();
        if !Self::is_valid_transition(current, next) {
            return false;
        }

        self.current.store(next.as_u8(), Ordering::SeqCst);
        true
    }
}
