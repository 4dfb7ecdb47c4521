/*!
 * Wait Statistics
 * Lock-free counters for registry and coordinator activity
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a registry and every coordinator using it
#[derive(Debug, Default)]
pub struct WaitStats {
    first_registrations: AtomicU64,
    joins: AtomicU64,
    releases: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
    cleanups: AtomicU64,
    abandoned: AtomicU64,
}

/// Point-in-time copy of [`WaitStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStatsSnapshot {
    pub first_registrations: u64,
    pub joins: u64,
    pub releases: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    pub cleanups: u64,
    pub abandoned: u64,
}

impl WaitStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_first_registration(&self) {
        self.first_registrations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    /// A registration finished after its coordinator had already returned
    #[inline]
    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WaitStatsSnapshot {
        WaitStatsSnapshot {
            first_registrations: self.first_registrations.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            cleanups: self.cleanups.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl WaitStatsSnapshot {
    /// Serialize for log lines and diagnostics endpoints
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
