/*!
 * Predicate Gate
 *
 * Condition waiting layered on a mutex: a waiter atomically releases the
 * mutex and parks, and a notifier wakes it to re-acquire and re-check.
 * Enqueueing happens under the parking-lot bucket lock *before* the
 * mutex is released, which closes the window between "check" and "wait"
 * that loses wakeups in naive implementations.
 *
 * Invariant: all state read by a wait predicate must only be mutated
 * while holding the same mutex the gate waits on.
 */

use super::mutex::{MutexGuard, RawMutex};
use super::WakeResult;
use parking_lot_core::{park, unpark_all, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Predicate-wait/notify primitive bound to a mutex
///
/// A gate associates with the mutex of the first guard it is asked to
/// wait with, for as long as any waiter is parked; waiting with a guard
/// of a different mutex in that window is a programming error and
/// panics. Notification is a hint, not a handoff: the woken thread still
/// races to re-acquire the mutex and must observe its predicate true
/// before a predicated wait returns.
///
/// # Example
///
/// ```
/// use keepsync::{Gate, Mutex};
/// use std::thread;
///
/// let state = Mutex::new(0u32);
/// let gate = Gate::new();
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         let mut guard = state.lock();
///         gate.wait_until(&mut guard, |count| *count == 2);
///         assert_eq!(*guard, 2);
///     });
///     for _ in 0..2 {
///         s.spawn(|| {
///             *state.lock() += 1;
///             gate.notify_one();
///         });
///     }
/// });
/// ```
pub struct Gate {
    /// Mutex the parked waiters are associated with; null while no
    /// waiter is parked.
    bound: AtomicPtr<RawMutex>,
}

impl Gate {
    /// Create a new gate with no waiters
    pub const fn new() -> Self {
        Self {
            bound: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Release the mutex, park, and re-acquire the mutex once woken
    ///
    /// A single un-predicated block: the caller is responsible for
    /// re-checking its condition, and spurious wakeups are possible.
    /// Prefer [`wait_until`] / [`wait_while`], which loop.
    ///
    /// [`wait_until`]: Gate::wait_until
    /// [`wait_while`]: Gate::wait_while
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        let raw = guard.raw() as *const RawMutex as *mut RawMutex;
        let key = self as *const Self as usize;
        let mut bad_mutex = false;

        let validate = || {
            // Runs under the bucket lock, so binding cannot race another
            // waiter's validate or a notifier's unpark.
            let bound = self.bound.load(Ordering::Relaxed);
            if bound.is_null() {
                self.bound.store(raw, Ordering::Relaxed);
            } else if bound != raw {
                bad_mutex = true;
                return false;
            }
            true
        };
        let before_sleep = || {
            // This thread is queued by now; a notifier that mutates the
            // predicate state under this mutex can no longer miss it.
            //
            // SAFETY: the caller's guard proves this thread holds the
            // mutex.
            unsafe { (*raw).unlock() }
        };
        let timed_out = |_: usize, _: bool| {};

        // SAFETY: the key is this gate's address and the callbacks do
        // not call into the parking lot.
        let result = unsafe { park(key, validate, before_sleep, timed_out, DEFAULT_PARK_TOKEN, None) };

        if bad_mutex {
            panic!("attempted to use a Gate with two different mutexes");
        }

        debug_assert!(matches!(result, ParkResult::Unparked(_)));

        // The guard is still live, so re-acquire before handing control
        // back to the caller.
        guard.raw().lock();
    }

    /// Wait until the predicate over the guarded data is true
    ///
    /// Returns with the mutex held and the predicate observed true under
    /// it. If the predicate is already true, returns without parking.
    pub fn wait_until<T>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        mut predicate: impl FnMut(&mut T) -> bool,
    ) {
        while !predicate(&mut **guard) {
            self.wait(guard);
        }
    }

    /// Wait as long as the predicate over the guarded data stays true
    pub fn wait_while<T>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        mut predicate: impl FnMut(&mut T) -> bool,
    ) {
        while predicate(&mut **guard) {
            self.wait(guard);
        }
    }

    /// Wake at most one parked waiter
    ///
    /// The woken thread still races to re-acquire the mutex; its
    /// predicate may well be false again by the time it looks.
    pub fn notify_one(&self) -> WakeResult {
        // Cleared whenever the last waiter leaves, so null means nobody
        // to wake.
        if self.bound.load(Ordering::Relaxed).is_null() {
            return WakeResult::NoWaiters;
        }

        let key = self as *const Self as usize;
        // SAFETY: the callback does not call into the parking lot.
        let result = unsafe {
            unpark_one(key, |unparked| {
                if !unparked.have_more_threads {
                    self.bound.store(ptr::null_mut(), Ordering::Relaxed);
                }
                DEFAULT_UNPARK_TOKEN
            })
        };

        if result.unparked_threads > 0 {
            WakeResult::Woken(result.unparked_threads)
        } else {
            WakeResult::NoWaiters
        }
    }

    /// Wake every parked waiter
    pub fn notify_all(&self) -> WakeResult {
        if self.bound.load(Ordering::Relaxed).is_null() {
            return WakeResult::NoWaiters;
        }

        let key = self as *const Self as usize;
        // Clear the binding first: a waiter arriving mid-wake re-binds
        // in its validate callback and is simply not covered by this
        // notification.
        self.bound.store(ptr::null_mut(), Ordering::Relaxed);

        // SAFETY: key is this gate's address.
        let woken = unsafe { unpark_all(key, DEFAULT_UNPARK_TOKEN) };

        if woken > 0 {
            WakeResult::Woken(woken)
        } else {
            WakeResult::NoWaiters
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("has_waiters", &!self.bound.load(Ordering::Relaxed).is_null())
            .finish()
    }
}
