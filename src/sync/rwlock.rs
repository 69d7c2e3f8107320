/*!
 * Reader-Writer Lock
 *
 * Shared/exclusive lock layered on the crate's own mutex and gate: the
 * admission state lives behind a small internal mutex, and blocked
 * readers/writers park on two gates.
 *
 * # Admission Policy
 *
 * Writer-preference: while a writer is active or queued, new readers
 * wait. This prevents writer starvation under read-heavy load; under
 * sustained write pressure readers can starve instead. No ordering
 * fairness beyond that is guaranteed.
 */

use super::gate::Gate;
use super::mutex::Mutex;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

/// Reader/writer admission state, guarded by the internal mutex
#[derive(Debug, Default)]
struct Admission {
    readers: usize,
    writer: bool,
    queued_writers: usize,
}

impl Admission {
    /// readers > 0 implies no writer; a writer implies no readers
    #[inline]
    fn admits_reader(&self) -> bool {
        !self.writer && self.queued_writers == 0
    }

    #[inline]
    fn admits_writer(&self) -> bool {
        !self.writer && self.readers == 0
    }
}

/// Reader-writer lock
///
/// Any number of concurrent readers, or exactly one writer, holds
/// access at a time. Access goes through the RAII guards returned by
/// [`read`] and [`write`]; a guard's drop releases its admission and
/// wakes whoever the policy admits next.
///
/// Re-entrant acquisition on one thread (e.g. `write` while holding a
/// read guard) deadlocks; that misuse is caller responsibility, matching
/// the minimal primitives this lock is built from.
///
/// # Example
///
/// ```
/// use keepsync::RwLock;
///
/// let lock = RwLock::new(5);
/// {
///     let r1 = lock.read();
///     let r2 = lock.read();
///     assert_eq!(*r1 + *r2, 10);
/// }
/// *lock.write() += 1;
/// assert_eq!(*lock.read(), 6);
/// ```
///
/// [`read`]: RwLock::read
/// [`write`]: RwLock::write
pub struct RwLock<T> {
    state: Mutex<Admission>,
    reader_gate: Gate,
    writer_gate: Gate,
    data: UnsafeCell<T>,
}

// SAFETY: read guards hand out &T concurrently (needs T: Sync), the
// write guard hands out &mut T across threads (needs T: Send).
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Create a new unlocked reader-writer lock protecting `value`
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(Admission {
                readers: 0,
                writer: false,
                queued_writers: 0,
            }),
            reader_gate: Gate::new(),
            writer_gate: Gate::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access, blocking while a writer is active or queued
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let mut state = self.state.lock();
        self.reader_gate
            .wait_until(&mut state, |s| s.admits_reader());
        state.readers += 1;
        drop(state);

        RwLockReadGuard { lock: self }
    }

    /// Acquire exclusive access, blocking while readers or a writer are active
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let mut state = self.state.lock();
        state.queued_writers += 1;
        self.writer_gate
            .wait_until(&mut state, |s| s.admits_writer());
        state.queued_writers -= 1;
        state.writer = true;
        drop(state);

        RwLockWriteGuard { lock: self }
    }

    /// Try to acquire shared access without blocking
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let mut state = self.state.lock();
        if !state.admits_reader() {
            return None;
        }
        state.readers += 1;
        drop(state);

        Some(RwLockReadGuard { lock: self })
    }

    /// Try to acquire exclusive access without blocking
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let mut state = self.state.lock();
        if !state.admits_writer() {
            return None;
        }
        state.writer = true;
        drop(state);

        Some(RwLockWriteGuard { lock: self })
    }

    /// Number of readers currently holding shared access
    pub fn reader_count(&self) -> usize {
        self.state.lock().readers
    }

    /// Check whether a writer currently holds exclusive access
    pub fn writer_active(&self) -> bool {
        self.state.lock().writer
    }

    /// Consume the lock and return the protected value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Access the data through an exclusive borrow, without locking
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Release a reader's admission and wake a queued writer if this was
    /// the last reader out
    fn release_read(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.readers > 0 && !state.writer);
        state.readers -= 1;

        if state.readers == 0 && state.queued_writers > 0 {
            drop(state);
            self.writer_gate.notify_one();
        }
    }

    /// Release the writer's admission and wake the next writer, or all
    /// blocked readers if no writer is queued
    fn release_write(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.writer && state.readers == 0);
        state.writer = false;

        let writers_queued = state.queued_writers > 0;
        drop(state);

        if writers_queued {
            self.writer_gate.notify_one();
        } else {
            self.reader_gate.notify_all();
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_struct("RwLock").field("data", &*guard).finish(),
            None => f.write_str("RwLock(<write locked>)"),
        }
    }
}

/// RAII shared access to a [`RwLock`]
///
/// Read-only; the reader admission is released when the guard drops.
#[must_use = "if unused, the RwLock will immediately release the read lock"]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: reader admission excludes any writer, so shared access
        // is safe.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RwLockReadGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

/// RAII exclusive access to a [`RwLock`]
///
/// The writer admission is released when the guard drops.
#[must_use = "if unused, the RwLock will immediately release the write lock"]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: writer admission excludes all other access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: writer admission excludes all other access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RwLockWriteGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_readers_share_access() {
        let lock = RwLock::new(3);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 3);
        assert_eq!(*r2, 3);
        assert_eq!(lock.reader_count(), 2);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = RwLock::new(0);
        let w = lock.write();
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn queued_writer_blocks_new_readers() {
        let lock = Arc::new(RwLock::new(0u32));
        let reader = lock.read();

        let writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                *lock.write() = 1;
            })
        };

        // Give the writer time to queue; new readers must now wait.
        thread::sleep(Duration::from_millis(50));
        assert!(lock.try_read().is_none());

        drop(reader);
        writer.join().unwrap();
        assert_eq!(*lock.read(), 1);
    }

    #[test]
    fn write_then_read_observes_update() {
        let lock = RwLock::new(String::new());
        lock.write().push_str("updated");
        assert_eq!(&*lock.read(), "updated");
        assert!(!lock.writer_active());
    }
}
