/*!
 * Parking Mutex
 *
 * Word-sized exclusive lock with adaptive spin-then-park acquisition.
 * Contended threads park through `parking_lot_core`, keyed on the lock's
 * own address, so an uncontended lock is a single compare-exchange.
 */

use super::config::SyncConfig;
use parking_lot_core::{park, unpark_one, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::cell::UnsafeCell;
use std::hint;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

const UNLOCKED: u8 = 0;
const LOCKED: u8 = 1;
/// Locked with at least one waiter parked (or about to park)
const CONTENDED: u8 = 2;

/// Exclusive-access lock primitive
///
/// The raw state machine with no data attached: created unlocked, at
/// most one holder at a time, not reentrant, no owner identity. Most
/// callers want [`Mutex`], which pairs the lock with the data it
/// protects; the raw form exists for building other primitives on top.
///
/// Acquisition spins briefly (see [`SyncConfig`]) before parking the
/// thread; unlock wakes one parked waiter, which races to re-acquire.
pub struct RawMutex {
    state: AtomicU8,
    config: SyncConfig,
}

impl RawMutex {
    /// Create a new unlocked mutex with default spin tuning
    pub const fn new() -> Self {
        Self::with_config(SyncConfig::DEFAULT)
    }

    /// Create a new unlocked mutex with the given spin tuning
    pub const fn with_config(config: SyncConfig) -> Self {
        Self {
            state: AtomicU8::new(UNLOCKED),
            config,
        }
    }

    /// Block the calling thread until the mutex is acquired
    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }
    }

    /// Try to acquire without blocking
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Check whether the mutex is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Release the mutex, waking one parked waiter if any
    ///
    /// # Safety
    ///
    /// The mutex must be held, and held by the current context: this
    /// primitive records no owner identity, so unlocking a mutex held
    /// elsewhere silently breaks mutual exclusion for every other user.
    #[inline]
    pub unsafe fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.unpark_waiter();
        }
    }

    /// Spin while the lock is held without parked waiters
    ///
    /// Returns the last observed state: anything other than `LOCKED`
    /// means spinning further is pointless (either the lock is free or
    /// other threads already gave up and parked).
    fn spin(&self) -> u8 {
        let yield_every = self.config.yield_every.max(1);
        let mut spins = 0;

        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state != LOCKED || spins >= self.config.spin_limit {
                return state;
            }

            spins += 1;
            if spins % yield_every == 0 {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
    }

    #[cold]
    fn lock_contended(&self) {
        let mut state = self.spin();

        // Cheap path: the holder left during the spin phase.
        if state == UNLOCKED {
            if self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }

        loop {
            // Mark the lock contended, acquiring it if it was free. Every
            // thread that reaches this point acquires via this swap, so
            // the CONTENDED marking survives while other waiters are
            // still parked and the final unlock still wakes them.
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return;
            }

            tracing::trace!(target: "keepsync::sync", "parking contended mutex waiter");

            let addr = self as *const Self as usize;
            // SAFETY: the key is this lock's address and the callbacks do
            // not call into the parking lot.
            let _ = unsafe {
                park(
                    addr,
                    // Revalidated under the bucket lock: parking is only
                    // valid while the lock is still marked contended.
                    || self.state.load(Ordering::Relaxed) == CONTENDED,
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                )
            };

            state = self.spin();
            if state == UNLOCKED
                && self
                    .state
                    .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
        }
    }

    #[cold]
    fn unpark_waiter(&self) {
        let addr = self as *const Self as usize;
        // SAFETY: same key as in lock_contended; the callback does not
        // call into the parking lot.
        unsafe {
            unpark_one(addr, |_| DEFAULT_UNPARK_TOKEN);
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Mutual-exclusion lock protecting a value
///
/// The data can only be reached through the RAII guard returned from
/// [`lock`] and [`try_lock`], so it is only ever touched while the lock
/// is held.
///
/// # Fairness
///
/// This is not a fair mutex: a releasing thread wakes one parked waiter,
/// but any arriving thread may grab the lock first.
///
/// # Example
///
/// ```
/// use keepsync::Mutex;
///
/// let counter = Mutex::new(0u64);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
///
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
pub struct Mutex<T> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

// SAFETY: the mutex hands out &mut T across threads one holder at a
// time, so T: Send suffices for both.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create a new unlocked mutex protecting `value`
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Create with explicit spin tuning
    pub const fn with_config(value: T, config: SyncConfig) -> Self {
        Self {
            raw: RawMutex::with_config(config),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, blocking until it is available
    ///
    /// The returned guard releases the lock when dropped, on every exit
    /// path, exactly once.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.lock();
        MutexGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Try to acquire the lock without blocking
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(MutexGuard {
                lock: self,
                _not_send: PhantomData,
            })
        } else {
            None
        }
    }

    /// Run `f` on the protected data under the lock
    ///
    /// Locks, runs, unlocks; the lock is released even if `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Check whether the mutex is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Consume the mutex and return the protected value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Access the data through an exclusive borrow, without locking
    ///
    /// The borrow checker already guarantees no other thread holds a
    /// reference.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub(crate) fn raw(&self) -> &RawMutex {
        &self.raw
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &*guard).finish(),
            None => f.write_str("Mutex(<locked>)"),
        }
    }
}

/// RAII scoped acquisition of a [`Mutex`]
///
/// The mutex is held for this guard's entire lifetime and released
/// exactly once, when the guard drops — on normal return, early return,
/// or panic unwind alike. Guards are move-only: responsibility for the
/// unlock cannot be duplicated.
#[must_use = "if unused, the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T> {
    lock: &'a Mutex<T>,
    // Keep the guard on the thread that parked waiters expect to be
    // woken by; raw pointers are never Send.
    _not_send: PhantomData<*mut ()>,
}

// SAFETY: the guard only exposes &T / &mut T, so sharing &guard across
// threads is as safe as sharing &T.
unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

impl<T> MutexGuard<'_, T> {
    pub(crate) fn raw(&self) -> &RawMutex {
        &self.lock.raw
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock, so access is exclusive.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, so access is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: this guard's existence proves the lock is held.
        unsafe { self.lock.raw.unlock() }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn uncontended_lock_roundtrip() {
        let m = Mutex::new(5);
        {
            let mut guard = m.lock();
            *guard += 1;
            assert!(m.is_locked());
        }
        assert!(!m.is_locked());
        assert_eq!(m.into_inner(), 6);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let m = Mutex::new(());
        let guard = m.lock();
        assert!(m.try_lock().is_none());
        drop(guard);
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn with_releases_on_exit() {
        let m = Mutex::new(vec![1]);
        let len = m.with(|v| {
            v.push(2);
            v.len()
        });
        assert_eq!(len, 2);
        assert!(!m.is_locked());
    }

    #[test]
    fn guarded_increments_are_not_lost() {
        let m = Arc::new(Mutex::new(0u64));
        let mut workers = Vec::new();

        for _ in 0..4 {
            let m = Arc::clone(&m);
            workers.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    *m.lock() += 1;
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(*m.lock(), 4_000);
    }

    #[test]
    fn get_mut_skips_locking() {
        let mut m = Mutex::with_config(1, SyncConfig::no_spin());
        *m.get_mut() = 7;
        assert_eq!(*m.lock(), 7);
    }
}
