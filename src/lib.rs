/*!
 * keepsync
 *
 * Ownership handles and thread-coordination primitives:
 * - Move-only and reference-counted resource handles with typed
 *   use-after-move errors instead of undefined behavior
 * - A parking mutex with RAII scoped guards
 * - A predicate gate for condition waiting
 * - A reader-writer lock with writer-preference admission
 */

pub mod handle;
pub mod sync;

// Re-exports
pub use handle::{Handle, HandleError, HandleResult, OwnedHandle, SharedHandle};
pub use sync::{
    Gate, Mutex, MutexGuard, RawMutex, RwLock, RwLockReadGuard, RwLockWriteGuard, SyncConfig,
    WakeResult,
};
