/*!
 * Handle Traits
 *
 * Core abstraction shared by both handle kinds
 */

use super::HandleMetadata;

/// Common surface of a resource handle
///
/// A handle owns (exclusively or jointly) at most one value at a time.
/// After a move-transfer or a release the handle is empty, and every
/// access through it must fail with a typed error rather than touch the
/// old value.
pub trait Handle: Send {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get handle metadata
    fn metadata(&self) -> &HandleMetadata;

    /// Check whether the handle currently holds (a share of) a value
    fn is_empty(&self) -> bool;

    /// Give up this handle's stake in the value
    ///
    /// Returns `true` if a stake was actually released. Idempotent:
    /// releasing an empty handle is a no-op returning `false`, never an
    /// error and never a second release of the value.
    fn release(&mut self) -> bool;
}
