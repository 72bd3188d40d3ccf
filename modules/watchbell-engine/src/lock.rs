use std::sync::atomic::{AtomicBool, Ordering};

/// Guards against overlapping reconciliation ticks. A tick that finds
/// the lock held is skipped, never queued.
#[derive(Default)]
pub struct TickLock {
    running: AtomicBool,
}

impl TickLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, or `None` if a tick is already running. The
    /// returned guard releases on drop, including on panic or early
    /// return from a failed tick.
    pub fn try_acquire(&self) -> Option<TickGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard { lock: self })
    }
}

pub struct TickGuard<'a> {
    lock: &'a TickLock,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::Release);
    }
}
