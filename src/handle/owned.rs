/*!
 * Owned Handle
 *
 * Move-only handle giving exclusive ownership of a value
 */

use super::traits::Handle;
use super::{HandleError, HandleMetadata, HandleResult};

/// Move-only handle with exclusive ownership of a value
///
/// At most one live handle ever observes a given value: transferring it
/// with [`take`] empties the source, and an empty handle reports
/// [`HandleError::UseAfterMove`] on every access instead of handing out
/// a dangling value.
///
/// Copying is not offered — ownership cannot be duplicated.
///
/// # Example
///
/// ```
/// use keepsync::OwnedHandle;
///
/// let mut a = OwnedHandle::new(445);
/// let b = a.take();
/// assert!(a.get().is_err());
/// assert_eq!(*b.get().unwrap(), 445);
/// ```
///
/// [`take`]: OwnedHandle::take
#[derive(Debug)]
pub struct OwnedHandle<T> {
    slot: Option<T>,
    metadata: HandleMetadata,
}

impl<T> OwnedHandle<T> {
    /// Create a handle owning `value`
    pub fn new(value: T) -> Self {
        Self {
            slot: Some(value),
            metadata: HandleMetadata::new("owned"),
        }
    }

    /// Create a handle with a vacant slot
    pub fn empty() -> Self {
        Self {
            slot: None,
            metadata: HandleMetadata::new("owned"),
        }
    }

    /// Move the value into a new handle, leaving this one empty
    ///
    /// No value is copied. Taking from an empty handle yields an empty
    /// handle.
    pub fn take(&mut self) -> Self {
        Self {
            slot: self.slot.take(),
            metadata: HandleMetadata::new("owned"),
        }
    }

    /// Access the owned value
    ///
    /// Fails with [`HandleError::UseAfterMove`] if the value was moved
    /// out or released.
    #[inline]
    pub fn get(&self) -> HandleResult<&T> {
        self.slot.as_ref().ok_or(HandleError::UseAfterMove)
    }

    /// Mutably access the owned value
    #[inline]
    pub fn get_mut(&mut self) -> HandleResult<&mut T> {
        self.slot.as_mut().ok_or(HandleError::UseAfterMove)
    }

    /// Install a new value, returning the previous one if present
    pub fn replace(&mut self, value: T) -> Option<T> {
        self.slot.replace(value)
    }

    /// Consume the handle and extract the value
    pub fn into_inner(mut self) -> HandleResult<T> {
        self.slot.take().ok_or(HandleError::UseAfterMove)
    }
}

impl<T> Handle for OwnedHandle<T>
where
    T: Send,
{
    fn resource_type(&self) -> &'static str {
        "owned"
    }

    fn metadata(&self) -> &HandleMetadata {
        &self.metadata
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    fn release(&mut self) -> bool {
        match self.slot.take() {
            Some(value) => {
                drop(value);
                tracing::trace!(
                    resource_type = "owned",
                    lifetime_micros = self.metadata.lifetime_micros(),
                    "released owned value"
                );
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for OwnedHandle<T> {
    fn drop(&mut self) {
        // Dropping an empty handle is a no-op; the value is released at
        // most once.
        self.slot = None;
    }
}

impl<T> Default for OwnedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for OwnedHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
