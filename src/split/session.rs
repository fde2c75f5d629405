//! Exclusivity and cooperative cancellation for split cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::error::SplitError;

/// Owner of the "a split is running" state.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct SplitLock {
    busy: Arc<AtomicBool>,
}

impl SplitLock {
    /// Creates an idle lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock, or fails with [`SplitError::SessionBusy`].
    pub fn try_acquire(&self) -> Result<SplitToken, SplitError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SplitError::SessionBusy)?;
        debug!("Split session acquired");
        Ok(SplitToken {
            busy: Arc::clone(&self.busy),
        })
    }
}

/// Proof of exclusive ownership of the index for one cycle.
///
/// Released on drop.
#[derive(Debug)]
pub struct SplitToken {
    busy: Arc<AtomicBool>,
}

impl Drop for SplitToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!("Split session released");
    }
}

/// Cancellation request shared between the caller and the applier.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation before the next planned commit.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
