/*!
 * Shared Handle
 *
 * Reference-counted handle giving shared ownership of a value
 */

use super::traits::Handle;
use super::{HandleError, HandleMetadata, HandleResult};
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// Heap cell shared by all handles to one value
struct SharedInner<T> {
    refs: AtomicUsize,
    value: T,
}

/// Reference-counted handle with shared ownership of a value
///
/// Cloning increments the live-handle count; each handle's release (or
/// drop) decrements it, and the value is dropped exactly once, when the
/// count reaches zero. The counter is atomic, so handles may be cloned
/// and dropped concurrently from any number of threads without external
/// locking.
///
/// Like [`OwnedHandle`], moving the value out with [`take`] leaves the
/// source empty: the count is untouched (ownership is shared, not
/// exclusive), but the emptied handle reports
/// [`HandleError::UseAfterMove`] on every access.
///
/// [`OwnedHandle`]: super::OwnedHandle
/// [`take`]: SharedHandle::take
pub struct SharedHandle<T> {
    ptr: Option<NonNull<SharedInner<T>>>,
    metadata: HandleMetadata,
}

// SAFETY: SharedHandle hands out &T from any thread holding a clone, so
// both Send and Sync require T: Send + Sync, mirroring Arc.
unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}
unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}

impl<T> SharedHandle<T> {
    /// Create a handle owning `value` with a count of 1
    pub fn new(value: T) -> Self {
        let inner = Box::new(SharedInner {
            refs: AtomicUsize::new(1),
            value,
        });

        Self {
            // SAFETY: Box::into_raw never returns null.
            ptr: Some(unsafe { NonNull::new_unchecked(Box::into_raw(inner)) }),
            metadata: HandleMetadata::new("shared"),
        }
    }

    /// Create a handle referencing nothing
    pub fn empty() -> Self {
        Self {
            ptr: None,
            metadata: HandleMetadata::new("shared"),
        }
    }

    /// Move this handle's stake into a new handle, leaving this one empty
    ///
    /// The count is untouched: the value still has the same number of
    /// owners, one of which is now the returned handle.
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
            metadata: HandleMetadata::new("shared"),
        }
    }

    /// Access the shared value
    ///
    /// Fails with [`HandleError::UseAfterMove`] if this handle was moved
    /// out or released.
    #[inline]
    pub fn get(&self) -> HandleResult<&T> {
        match self.ptr {
            // SAFETY: a non-empty handle holds a stake in the count, so
            // the inner cell outlives &self.
            Some(ptr) => Ok(unsafe { &ptr.as_ref().value }),
            None => Err(HandleError::UseAfterMove),
        }
    }

    /// Number of live handles sharing the value (0 for an empty handle)
    ///
    /// Observability and testing only; the count may change concurrently
    /// the moment it is read.
    pub fn use_count(&self) -> usize {
        match self.ptr {
            // SAFETY: see get().
            Some(ptr) => unsafe { ptr.as_ref() }.refs.load(Ordering::Acquire),
            None => 0,
        }
    }

    /// Check whether two handles share the same value
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.ptr, other.ptr) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Decrement the count, dropping the value if this was the last stake
    fn drop_stake(&mut self) -> bool {
        let Some(ptr) = self.ptr.take() else {
            return false;
        };

        // SAFETY: we held a stake, so the inner cell is still live.
        let old = unsafe { ptr.as_ref() }.refs.fetch_sub(1, Ordering::Release);
        if old == 1 {
            // Synchronize with every other handle's Release decrement so
            // the value drop observes all writes made through them.
            fence(Ordering::Acquire);
            // SAFETY: the count reached zero, so this is the only handle
            // left; nothing can resurrect the cell.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
            tracing::trace!(
                resource_type = "shared",
                lifetime_micros = self.metadata.lifetime_micros(),
                "released last shared stake, value dropped"
            );
        }
        true
    }
}

impl<T> Clone for SharedHandle<T> {
    /// Copy the handle, incrementing the shared count
    ///
    /// Cloning an empty handle yields an empty handle.
    fn clone(&self) -> Self {
        if let Some(ptr) = self.ptr {
            // SAFETY: &self holds a stake, so the cell is live. Relaxed
            // is enough: the new stake is published by handing the clone
            // to another thread, which is itself a synchronizing act.
            let old = unsafe { ptr.as_ref() }.refs.fetch_add(1, Ordering::Relaxed);

            // A count this high can only result from mem::forget abuse;
            // give up before it can overflow into a premature free.
            if old > isize::MAX as usize {
                std::process::abort();
            }
        }

        Self {
            ptr: self.ptr,
            metadata: HandleMetadata::new("shared"),
        }
    }
}

impl<T> Handle for SharedHandle<T>
where
    T: Send + Sync,
{
    fn resource_type(&self) -> &'static str {
        "shared"
    }

    fn metadata(&self) -> &HandleMetadata {
        &self.metadata
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    fn release(&mut self) -> bool {
        self.drop_stake()
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.drop_stake();
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Ok(value) => f
                .debug_struct("SharedHandle")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            Err(_) => f.write_str("SharedHandle(<empty>)"),
        }
    }
}
