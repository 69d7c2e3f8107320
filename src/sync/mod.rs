/*!
 * Thread-Coordination Primitives
 *
 * Blocking synchronization primitives built on `parking_lot_core`
 * thread parking (futex on Linux, optimized waits elsewhere):
 *
 * - [`RawMutex`] / [`Mutex`]: exclusive-access lock with adaptive
 *   spin-then-park acquisition and RAII scoped guards
 * - [`Gate`]: predicate-wait/notify primitive layered on a mutex
 * - [`RwLock`]: shared/exclusive lock with writer-preference admission
 *
 * All blocking calls are synchronous and unbounded: they complete or
 * they wait. There is no timeout or cancellation model at this layer.
 *
 * # Shared-state policy
 *
 * Data protected by a [`Mutex`] or [`RwLock`] may only be touched while
 * holding the corresponding guard; mutation requires the exclusive
 * guard. State read by a [`Gate`] predicate must only be mutated while
 * holding the same mutex the gate waits on.
 */

mod config;
mod gate;
mod mutex;
mod rwlock;

pub use config::SyncConfig;
pub use gate::Gate;
pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were waiting
    NoWaiters,
}

impl WakeResult {
    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}
