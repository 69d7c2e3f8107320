/*!
 * Synchronization Configuration
 *
 * Tuning for the contended-acquisition spin phase
 */

/// Spin-phase tuning for contended lock acquisition
///
/// A contended [`Mutex`] spins briefly before parking the thread: when
/// critical sections are short, the holder usually finishes within a few
/// hundred nanoseconds and parking would cost far more than it saves.
///
/// [`Mutex`]: super::Mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Spin iterations before parking
    pub spin_limit: u32,
    /// Yield to the scheduler every N spins
    pub yield_every: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl SyncConfig {
    /// Default tuning, usable in const contexts
    pub const DEFAULT: Self = Self {
        spin_limit: 100,
        yield_every: 10,
    };

    /// Configuration optimized for very short critical sections
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: 500,
            yield_every: 10,
        }
    }

    /// Park immediately, never spin
    ///
    /// Best when critical sections are long and waiters should not burn
    /// CPU at all.
    pub const fn no_spin() -> Self {
        Self {
            spin_limit: 0,
            yield_every: 1,
        }
    }
}
