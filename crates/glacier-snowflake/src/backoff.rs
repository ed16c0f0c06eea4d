use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single back-off sleep while waiting for the clock to
/// tick past an exhausted millisecond.
pub const MAX_BACKOFF: Duration = Duration::from_millis(4);

/// Sleep duration for the `count`-th waiter on the same exhausted
/// millisecond: one millisecond per waiter, clamped to `1..=MAX_BACKOFF`.
pub fn backoff_for(count: u64) -> Duration {
    Duration::from_millis(count.max(1)).min(MAX_BACKOFF)
}

/// Number of callers currently waiting past each exhausted timestamp.
#[derive(Debug, Default)]
pub(crate) struct WaitCounters {
    waiting: DashMap<i64, u64>,
}

impl WaitCounters {
    /// Registers a waiter on `timestamp` and returns the waiter count,
    /// including the caller.
    pub(crate) fn enter(&self, timestamp: i64) -> u64 {
        let mut count = self.waiting.entry(timestamp).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops the whole entry for a timestamp that has passed.
    pub(crate) fn release(&self, timestamp: i64) {
        self.waiting.remove(&timestamp);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }
}

/// Cancels a millisecond wait that is already in progress, which then
/// fails with [`Error::Interrupted`](crate::Error::Interrupted).
///
/// Every wait clears the flag when it starts, so an interrupt sent while
/// nobody is waiting has no effect on later waits.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Discards any interrupt sent before the current wait began.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Clears the flag, returning whether it was set.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}
