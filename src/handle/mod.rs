/*!
 * Resource Handles
 *
 * Handles mediate access to owned values with explicit lifecycle state.
 *
 * ## Handle Types
 *
 * - **OwnedHandle**: exclusive ownership, transferred only by move
 * - **SharedHandle**: reference-counted shared ownership, freed when the
 *   last handle is gone
 *
 * Both handles keep an explicit empty/consumed state: moving a value out
 * leaves the source handle empty, and any later access returns a typed
 * [`HandleError::UseAfterMove`] instead of undefined behavior. Releasing
 * is idempotent, so a double release is structurally impossible rather
 * than merely detectable.
 */

mod owned;
mod shared;
mod traits;

pub use owned::OwnedHandle;
pub use shared::SharedHandle;
pub use traits::Handle;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for handle operations
pub type HandleResult<T> = Result<T, HandleError>;

/// Errors that can occur when accessing a handle
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum HandleError {
    #[error("Handle is empty: value was moved out or already released")]
    #[diagnostic(
        code(handle::use_after_move),
        help("The value was transferred to another handle or released. Access it through its current owner.")
    )]
    UseAfterMove,
}

/// Handle metadata for observability
#[derive(Debug, Clone)]
pub struct HandleMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
}

impl HandleMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
