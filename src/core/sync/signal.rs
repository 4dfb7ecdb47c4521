/*!
 * Release Signal
 *
 * One-shot broadcast: fires at most once, observed by any number of waiters.
 * Waiters arriving after the fire return immediately.
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Result of firing a release signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Fired and woke N blocked waiters (N >= 1)
    Woken(usize),
    /// Fired with nobody blocked
    NoWaiters,
    /// The signal had already fired; nothing happened
    AlreadyFired,
}

impl WakeResult {
    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters | WakeResult::AlreadyFired => 0,
        }
    }
}

/// One-shot, many-observer release signal
///
/// Firing twice is a bug in whoever owns the signal. The second call is
/// reported as [`WakeResult::AlreadyFired`] and otherwise ignored;
/// [`ReleaseHandle`](super::ReleaseHandle) makes it unrepresentable for
/// registry-owned signals.
#[derive(Debug, Default)]
pub struct ReleaseSignal {
    fired: AtomicBool,
    waiters: AtomicUsize,
    notify: Notify,
}

impl ReleaseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Approximate count of tasks currently blocked in [`wait`](Self::wait)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    /// Fire the signal, waking every blocked waiter
    pub fn fire(&self) -> WakeResult {
        if self.fired.swap(true, Ordering::AcqRel) {
            return WakeResult::AlreadyFired;
        }

        let waiters = self.waiters.load(Ordering::Acquire);
        self.notify.notify_waiters();

        match waiters {
            0 => WakeResult::NoWaiters,
            n => WakeResult::Woken(n),
        }
    }

    /// Block until the signal fires
    ///
    /// Cancel safe: dropping the future deregisters the waiter.
    pub async fn wait(&self) {
        if self.is_fired() {
            return;
        }

        let _waiter = WaiterSlot::enter(&self.waiters);

        let notified = self.notify.notified();
        tokio::pin!(notified);

        // Register interest before the re-check so a fire in between is not lost
        notified.as_mut().enable();
        if self.is_fired() {
            return;
        }

        notified.await;
    }
}

/// Keeps the waiter count accurate across cancellation
struct WaiterSlot<'a>(&'a AtomicUsize);

impl<'a> WaiterSlot<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for WaiterSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
